//! # Configuration
//!
//! Serializable settings for the viewer. Files are read and written as TOML
//! or RON depending on their extension; every section has defaults that
//! reproduce the stock scene, so a partial file is enough.

use std::path::Path;

pub use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;
use crate::render::device::{Color, DeviceCaps};
use crate::render::headless::HeadlessDevice;
use crate::render::lighting::DirectionalLight;
use crate::render::stats::StatsConfig;
use crate::scene::{Animation, SceneObjectDesc};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match extension(path) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension(path) {
            Some("toml") => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Values parsed but make no sense together
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Backbuffer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Backbuffer width
    pub width: u32,
    /// Backbuffer height
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Model Viewer".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// A mesh the headless device can load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshSpec {
    /// Asset name
    pub name: String,
    /// Vertex count reported on load
    pub vertices: u32,
    /// Face count reported on load
    pub faces: u32,
}

impl MeshSpec {
    fn new(name: &str, vertices: u32, faces: u32) -> Self {
        Self {
            name: name.to_string(),
            vertices,
            faces,
        }
    }
}

/// Device capabilities and mesh catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Reported shader models
    pub caps: DeviceCaps,
    /// Meshes available to `load_mesh`
    pub meshes: Vec<MeshSpec>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            caps: DeviceCaps::default(),
            meshes: vec![
                MeshSpec::new("skullocc.x", 31_070, 60_000),
                MeshSpec::new("dwarf.x", 8_537, 8_936),
                MeshSpec::new("tiny.x", 4_432, 6_841),
            ],
        }
    }
}

/// Camera placement and lens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Eye position
    pub position: Vec3,
    /// Look-at point
    pub target: Vec3,
    /// Up vector
    pub up: Vec3,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near plane
    pub near: f32,
    /// Far plane
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, -10.0),
            target: Vec3::new(0.0, 3.0, 0.0),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov_degrees: 45.0,
            near: 1.0,
            far: 1000.0,
        }
    }
}

/// Everything the render loop needs to build its scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Camera
    pub camera: CameraConfig,
    /// Light shared by both techniques
    pub light: DirectionalLight,
    /// Statistics overlay
    pub stats: StatsConfig,
    /// Backbuffer clear color
    pub clear_color: Color,
    /// Objects loaded at initialization, in order
    pub objects: Vec<SceneObjectDesc>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            light: DirectionalLight::default(),
            stats: StatsConfig::default(),
            clear_color: Color::WHITE,
            objects: vec![
                SceneObjectDesc::new("skull", "skullocc.x", Vec3::new(-4.0, 3.0, 100.0))
                    .with_scale(0.5)
                    .with_animation(Animation::Oscillate),
                SceneObjectDesc::new("dwarf", "dwarf.x", Vec3::new(0.0, 3.0, -10.0)),
                SceneObjectDesc::new("tiny", "tiny.x", Vec3::new(0.0, 3.0, -10.0))
                    .with_scale(0.01)
                    .with_animation(Animation::Oscillate),
            ],
        }
    }
}

/// Host loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop after this many presented frames
    pub max_frames: Option<u64>,
    /// Feed this delta instead of wall-clock time
    pub fixed_delta: Option<f32>,
    /// Lose the device after this many presented frames
    pub device_loss_at_frame: Option<u64>,
    /// Cooperative-level polls the simulated loss lasts
    pub lost_polls: u32,
    /// Pause between polls while the device is lost, in milliseconds
    pub lost_sleep_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_frames: Some(600),
            fixed_delta: None,
            device_loss_at_frame: None,
            lost_polls: 3,
            lost_sleep_ms: 20,
        }
    }
}

/// Top-level viewer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Backbuffer
    pub window: WindowConfig,
    /// Device capabilities and assets
    pub device: DeviceConfig,
    /// Scene contents
    pub scene: SceneConfig,
    /// Host loop
    pub run: RunConfig,
}

impl ViewerConfig {
    /// Reject values the render loop cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.scene.camera;
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(ConfigError::Invalid(format!(
                "camera planes near={} far={}",
                camera.near, camera.far
            )));
        }
        if !(camera.fov_degrees > 0.0 && camera.fov_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!("camera fov {} degrees", camera.fov_degrees)));
        }
        if self.scene.stats.refresh_interval <= 0.0 {
            return Err(ConfigError::Invalid("stats refresh interval must be positive".to_string()));
        }
        if let Some(object) = self.scene.objects.iter().find(|o| o.name.is_empty() || o.mesh.is_empty()) {
            return Err(ConfigError::Invalid(format!("object {:?} needs a name and a mesh", object.name)));
        }
        Ok(())
    }

    /// Headless device sized to the window with the configured caps and meshes
    pub fn headless_device(&self) -> HeadlessDevice {
        self.device.meshes.iter().fold(
            HeadlessDevice::new(self.window.width, self.window.height).with_caps(self.device.caps),
            |device, mesh| device.with_mesh(mesh.name.clone(), mesh.vertices, mesh.faces),
        )
    }
}

impl Config for ViewerConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::ShaderModel;
    use crate::render::effects::Technique;

    #[test]
    fn test_defaults_reproduce_stock_scene() {
        let config = ViewerConfig::default();
        assert!(config.validate().is_ok());

        let names: Vec<_> = config.scene.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["skull", "dwarf", "tiny"]);
        assert_eq!(config.scene.objects[1].animation, Animation::Static);
        assert_eq!(config.scene.clear_color, Color::WHITE);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = r#"
            [window]
            width = 1024
            height = 768

            [device.caps]
            vertex_shader = { major = 1, minor = 1 }
            pixel_shader = { major = 2, minor = 0 }

            [[scene.objects]]
            name = "box"
            mesh = "box.x"
            position = [1.0, 2.0, 3.0]
            animation = "oscillate"
            technique = "skinned_mesh"
        "#;
        let config: ViewerConfig = toml::from_str(text).unwrap();

        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.title, "Model Viewer");
        assert_eq!(config.device.caps.vertex_shader, ShaderModel::SM_1_1);
        assert_eq!(config.scene.objects.len(), 1);
        assert_eq!(config.scene.objects[0].scale, 1.0);
        assert_eq!(config.scene.objects[0].technique, Technique::SkinnedMesh);
        assert_eq!(config.scene.camera, CameraConfig::default());
    }

    #[test]
    fn test_invalid_planes_rejected() {
        let mut config = ViewerConfig::default();
        config.scene.camera.near = 5.0;
        config.scene.camera.far = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load_ron() {
        let path = std::env::temp_dir().join(format!("render_loop_config_{}.ron", std::process::id()));
        let mut config = ViewerConfig::default();
        config.run.max_frames = Some(12);

        config.save_to_file(&path).unwrap();
        let loaded = ViewerConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.run.max_frames, Some(12));
        assert_eq!(loaded.scene.objects.len(), 3);
    }

    #[test]
    fn test_unknown_extension() {
        let err = ViewerConfig::default().save_to_file("viewer.ini").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
