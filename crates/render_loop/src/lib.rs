//! # Render Loop
//!
//! The per-frame update/draw loop of a small lit mesh viewer, together with
//! the device lifecycle it has to survive.
//!
//! ## Features
//!
//! - **Lifecycle State Machine**: initialize, lose and reset the device, shut down
//! - **Effect Pipeline**: begin/end protocol enforced by scope guards
//! - **Camera**: left-handed view and projection with aspect tracking
//! - **Frame Statistics**: smoothed FPS and geometry counts overlay
//! - **Headless Device**: journaled backend for demos and tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_loop::prelude::*;
//!
//! fn main() -> Result<(), RenderError> {
//!     let config = ViewerConfig::default();
//!     let pipeline = EffectPipeline::shared();
//!     let mut controller =
//!         RenderLoopController::new(config.headless_device(), pipeline.clone(), config.scene.clone());
//!     controller.initialize()?;
//!
//!     let mut driver = FrameDriver::new();
//!     for _ in 0..60 {
//!         driver.tick(&mut controller)?;
//!     }
//!
//!     controller.shutdown();
//!     pipeline.borrow_mut().destroy_all();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::cast_precision_loss)]

pub mod config;
pub mod controller;
pub mod foundation;
pub mod frame_loop;
pub mod render;
pub mod scene;

pub use controller::{FrameHandler, LoopState, RenderLoopController, MIN_SHADER_MODEL};
pub use frame_loop::{DeviceHost, FrameDriver, FrameOutcome};
pub use render::RenderError;

/// Common imports for render loop users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, ViewerConfig},
        controller::{FrameHandler, LoopState, RenderLoopController},
        foundation::{
            math::{Mat4, Vec3},
            time::Timer,
        },
        frame_loop::{DeviceHost, FrameDriver, FrameOutcome},
        render::{
            Camera, DeviceError, EffectPipeline, FrameStats, GraphicsDevice, HeadlessDevice, RenderError,
            SharedPipeline, Technique,
        },
        scene::{Scene, SceneObject, SceneObjectDesc},
    };
}
