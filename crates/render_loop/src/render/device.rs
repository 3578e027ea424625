//! # Graphics Device Abstraction
//!
//! The render loop never talks to a concrete graphics API. Everything it
//! needs from the host (capabilities, clear/begin/end/present, mesh assets,
//! compiled effects and the text overlay) goes through the traits below, so
//! the device is injected rather than reached through a global.
//!
//! ## Lifetime Rules
//! - Effects and overlays created by a device are *device-dependent*: they
//!   must be told about device loss (`on_lost_device`) before the device is
//!   reset, and about the reset (`on_reset_device`) afterwards.
//! - `begin_scene`/`end_scene` and the effect `begin`/`end`,
//!   `begin_pass`/`end_pass` pairs must always balance.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::foundation::math::{Mat4, Vec3};
use crate::render::lighting::DirectionalLight;

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors surfaced by the graphics device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// A device call failed
    #[error("Device call {call} failed: {reason}")]
    CallFailed {
        /// Name of the failing call
        call: &'static str,
        /// Driver-provided reason
        reason: String,
    },

    /// The device is lost and must be reset before use
    #[error("Device is lost")]
    Lost,

    /// A named asset is unknown to the device
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// The call is not valid in the current device state
    #[error("Invalid call: {0}")]
    InvalidCall(String),
}

/// Shader model version, e.g. 2.0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShaderModel {
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
}

impl ShaderModel {
    /// Shader model 1.1
    pub const SM_1_1: Self = Self::new(1, 1);
    /// Shader model 2.0, the minimum the effects are written against
    pub const SM_2_0: Self = Self::new(2, 0);
    /// Shader model 3.0
    pub const SM_3_0: Self = Self::new(3, 0);

    /// Create a shader model version
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ShaderModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Capabilities reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCaps {
    /// Highest supported vertex shader model
    pub vertex_shader: ShaderModel,
    /// Highest supported pixel shader model
    pub pixel_shader: ShaderModel,
}

impl DeviceCaps {
    /// Whether both stages reach `required`
    pub fn supports(&self, required: ShaderModel) -> bool {
        self.vertex_shader >= required && self.pixel_shader >= required
    }
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self {
            vertex_shader: ShaderModel::SM_3_0,
            pixel_shader: ShaderModel::SM_3_0,
        }
    }
}

bitflags! {
    /// Buffers to clear at the start of a frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        /// Color target
        const TARGET = 0b0001;
        /// Depth buffer
        const ZBUFFER = 0b0010;
        /// Stencil buffer
        const STENCIL = 0b0100;
    }
}

/// Linear RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Opaque black
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Create a color
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Uniform gray with full alpha
    pub const fn gray(level: f32) -> Self {
        Self::new(level, level, level, 1.0)
    }
}

/// Opaque handle to a device-owned mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// A loaded mesh and the geometry counts reported at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshInfo {
    /// Device handle
    pub handle: MeshHandle,
    /// Number of vertices
    pub vertex_count: u32,
    /// Number of faces (triangles)
    pub face_count: u32,
}

/// Cooperative level of the device, polled once per message-pump iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Device usable
    Ready,
    /// Device lost and not yet resettable
    Lost,
    /// Device lost but can be reset now
    NotReset,
}

/// Font used by the statistics overlay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontDesc {
    /// Character cell height in pixels
    pub height: i32,
    /// Font weight (0 = default)
    pub weight: u32,
    /// Typeface name
    pub face_name: String,
}

impl Default for FontDesc {
    fn default() -> Self {
        Self {
            height: 18,
            weight: 0,
            face_name: "Times New Roman".to_string(),
        }
    }
}

/// The physical rendering context provided by the host
pub trait GraphicsDevice {
    /// Shader capabilities of the device
    fn capabilities(&self) -> DeviceCaps;

    /// Current backbuffer dimensions in pixels
    fn backbuffer_extent(&self) -> (u32, u32);

    /// Poll whether the device is usable, lost, or ready to be reset
    fn cooperative_level(&mut self) -> DeviceStatus;

    /// Reset a lost device; device-dependent resources must be released first
    fn reset(&mut self) -> DeviceResult<()>;

    /// Clear the selected buffers
    fn clear(&mut self, flags: ClearFlags, color: Color, depth: f32, stencil: u32) -> DeviceResult<()>;

    /// Begin recording a frame
    fn begin_scene(&mut self) -> DeviceResult<()>;

    /// Finish recording a frame
    fn end_scene(&mut self) -> DeviceResult<()>;

    /// Present the backbuffer
    fn present(&mut self) -> DeviceResult<()>;

    /// Load a mesh asset by name
    fn load_mesh(&mut self, name: &str) -> DeviceResult<MeshInfo>;

    /// Release a mesh previously returned by `load_mesh`
    fn release_mesh(&mut self, mesh: MeshHandle);

    /// Submit a mesh; only valid inside an open effect pass
    fn draw_mesh(&mut self, mesh: MeshHandle) -> DeviceResult<()>;

    /// Compile an effect from a named source
    fn create_effect(&mut self, source: &str) -> DeviceResult<Box<dyn ShaderEffect>>;

    /// Create the text overlay used for on-screen statistics
    fn create_text_overlay(&mut self, font: &FontDesc) -> DeviceResult<Box<dyn TextOverlay>>;
}

/// A compiled GPU effect with named techniques
pub trait ShaderEffect {
    /// Source name the effect was compiled from
    fn source(&self) -> &str;

    /// Select the active technique
    fn set_technique(&mut self, technique: &str) -> DeviceResult<()>;

    /// Upload directional light parameters
    fn set_directional_light(&mut self, light: &DirectionalLight) -> DeviceResult<()>;

    /// Upload the eye position used for specular terms
    fn set_eye_position(&mut self, eye: &Vec3) -> DeviceResult<()>;

    /// Upload per-object transforms
    fn set_transforms(&mut self, world: &Mat4, world_view_proj: &Mat4) -> DeviceResult<()>;

    /// Begin the active technique, returning its pass count
    fn begin(&mut self) -> DeviceResult<u32>;

    /// Begin a pass of the active technique
    fn begin_pass(&mut self, pass: u32) -> DeviceResult<()>;

    /// Flush parameter changes made inside a pass
    fn commit_changes(&mut self) -> DeviceResult<()>;

    /// End the open pass
    fn end_pass(&mut self) -> DeviceResult<()>;

    /// End the active technique
    fn end(&mut self) -> DeviceResult<()>;

    /// Release device-dependent state
    fn on_lost_device(&mut self) -> DeviceResult<()>;

    /// Reacquire device-dependent state
    fn on_reset_device(&mut self) -> DeviceResult<()>;
}

/// Device-dependent text renderer
pub trait TextOverlay {
    /// Draw text with its top-left corner at `(x, y)`
    fn draw_text(&mut self, text: &str, x: i32, y: i32, color: Color) -> DeviceResult<()>;

    /// Release device-dependent state
    fn on_lost_device(&mut self) -> DeviceResult<()>;

    /// Reacquire device-dependent state
    fn on_reset_device(&mut self) -> DeviceResult<()>;
}
