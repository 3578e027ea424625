//! # Rendering
//!
//! Device abstraction and the per-frame rendering pieces the render loop
//! composes: camera, lighting, effect pipeline, statistics overlay and the
//! begin/end-scene guard.

pub mod camera;
pub mod device;
pub mod effects;
pub mod frame;
pub mod headless;
pub mod lighting;
pub mod stats;

pub use camera::{Camera, CameraError};
pub use device::{
    ClearFlags, Color, DeviceCaps, DeviceError, DeviceResult, DeviceStatus, FontDesc, GraphicsDevice, MeshHandle,
    MeshInfo, ShaderEffect, ShaderModel, TextOverlay,
};
pub use effects::{ClientId, EffectPipeline, EffectScope, PassScope, SharedPipeline, Technique};
pub use frame::FrameScope;
pub use headless::HeadlessDevice;
pub use lighting::DirectionalLight;
pub use stats::{FrameStats, StatsConfig};

use thiserror::Error;

use crate::controller::LoopState;

/// Rendering errors surfaced by the render loop
#[derive(Error, Debug)]
pub enum RenderError {
    /// The device lacks the required shader model; startup must abort
    #[error("Unsupported device: vertex shader {vertex}, pixel shader {pixel} (need {required})")]
    UnsupportedDevice {
        /// Reported vertex shader model
        vertex: ShaderModel,
        /// Reported pixel shader model
        pixel: ShaderModel,
        /// Minimum required for both stages
        required: ShaderModel,
    },

    /// A device call failed
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Camera parameters were rejected
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    /// The operation is not valid in the current loop state
    #[error("Render loop not ready: {0:?}")]
    NotReady(LoopState),
}
