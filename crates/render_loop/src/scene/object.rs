//! Renderable scene objects
//!
//! A scene object pairs a device-owned mesh with a world transform and a
//! time-based animation. Geometry counts are captured once at load time.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat4, Quat, Transform, Vec3};
use crate::render::device::{DeviceResult, GraphicsDevice, MeshHandle, MeshInfo};
use crate::render::effects::{PassScope, Technique};

/// Per-frame animation applied by `advance`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Animation {
    /// Never moves on its own
    #[default]
    Static,
    /// Yaws by `sin(dt)` each frame
    Oscillate,
}

/// How to load and place one object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObjectDesc {
    /// Display name
    pub name: String,
    /// Mesh asset name passed to the device
    pub mesh: String,
    /// World position
    pub position: Vec3,
    /// Direction the model's +Z axis should face
    #[serde(default = "default_facing")]
    pub facing: Vec3,
    /// Initial yaw in radians, applied after `facing`
    #[serde(default)]
    pub angle: f32,
    /// Uniform scale
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Per-frame animation
    #[serde(default)]
    pub animation: Animation,
    /// Technique the object is drawn with
    #[serde(default = "default_technique")]
    pub technique: Technique,
}

fn default_facing() -> Vec3 {
    Vec3::z()
}

const fn default_scale() -> f32 {
    1.0
}

const fn default_technique() -> Technique {
    Technique::StaticMesh
}

impl SceneObjectDesc {
    /// Static-mesh object facing +Z with unit scale
    pub fn new(name: impl Into<String>, mesh: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            mesh: mesh.into(),
            position,
            facing: default_facing(),
            angle: 0.0,
            scale: default_scale(),
            animation: Animation::Static,
            technique: default_technique(),
        }
    }

    /// Set the uniform scale
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Set the animation
    pub fn with_animation(mut self, animation: Animation) -> Self {
        self.animation = animation;
        self
    }

    /// Set the technique
    pub fn with_technique(mut self, technique: Technique) -> Self {
        self.technique = technique;
        self
    }
}

/// A loaded, placed mesh
#[derive(Debug, Clone)]
pub struct SceneObject {
    name: String,
    mesh: MeshInfo,
    transform: Transform,
    animation: Animation,
    technique: Technique,
}

impl SceneObject {
    /// Load the mesh named by `desc` and place it
    pub fn load<D: GraphicsDevice + ?Sized>(device: &mut D, desc: &SceneObjectDesc) -> DeviceResult<Self> {
        let mesh = device.load_mesh(&desc.mesh)?;
        log::debug!(
            "Loaded {} ({}): {} vertices, {} triangles",
            desc.name,
            desc.mesh,
            mesh.vertex_count,
            mesh.face_count
        );

        let mut object = Self {
            name: desc.name.clone(),
            mesh,
            transform: Transform::default(),
            animation: desc.animation,
            technique: desc.technique,
        };
        object.place(desc.position, desc.facing, desc.angle);
        object.set_scale(desc.scale);
        Ok(object)
    }

    /// Position the object, turn its +Z toward `facing`, then yaw by `angle`
    pub fn place(&mut self, position: Vec3, facing: Vec3, angle: f32) {
        let facing_rotation = facing.try_normalize(f32::EPSILON).map_or_else(Quat::identity, |dir| {
            Quat::rotation_between(&Vec3::z(), &dir)
                .unwrap_or_else(|| Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::PI))
        });

        self.transform.position = position;
        self.transform.rotation = facing_rotation * Quat::from_axis_angle(&Vec3::y_axis(), angle);
    }

    /// Set a uniform scale
    pub fn set_scale(&mut self, scale: f32) {
        self.transform.scale = Vec3::repeat(scale);
    }

    /// Yaw about the object's own up axis
    pub fn rotate(&mut self, angle: f32) {
        self.transform.rotation *= Quat::from_axis_angle(&Vec3::y_axis(), angle);
    }

    /// Advance the object's animation by `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        match self.animation {
            Animation::Static => {}
            Animation::Oscillate => self.rotate(dt.sin()),
        }
    }

    /// World matrix
    pub fn world_matrix(&self) -> Mat4 {
        self.transform.to_matrix()
    }

    /// Upload transforms and submit the mesh inside an open pass
    pub fn draw<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        pass: &mut PassScope<'_>,
        view_proj: &Mat4,
    ) -> DeviceResult<()> {
        let world = self.world_matrix();
        pass.set_transforms(&world, &(view_proj * world))?;
        pass.commit()?;
        device.draw_mesh(self.mesh.handle)
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device mesh handle
    pub fn mesh_handle(&self) -> MeshHandle {
        self.mesh.handle
    }

    /// Vertices reported at load time
    pub fn vertex_count(&self) -> u32 {
        self.mesh.vertex_count
    }

    /// Triangles reported at load time
    pub fn triangle_count(&self) -> u32 {
        self.mesh.face_count
    }

    /// World transform
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Orientation
    pub fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    /// Animation
    pub fn animation(&self) -> Animation {
        self.animation
    }

    /// Technique the object draws with
    pub fn technique(&self) -> Technique {
        self.technique
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessDevice;
    use approx::assert_relative_eq;

    fn device() -> HeadlessDevice {
        HeadlessDevice::new(640, 480).with_mesh("skull.x", 300, 120)
    }

    #[test]
    fn test_load_reports_counts_and_scale() {
        let mut device = device();
        let desc = SceneObjectDesc::new("skull", "skull.x", Vec3::new(-4.0, 3.0, 100.0)).with_scale(0.5);
        let object = SceneObject::load(&mut device, &desc).unwrap();

        assert_eq!(object.vertex_count(), 300);
        assert_eq!(object.triangle_count(), 120);
        assert_eq!(object.transform().scale, Vec3::repeat(0.5));
        assert_eq!(object.transform().position, Vec3::new(-4.0, 3.0, 100.0));
    }

    #[test]
    fn test_oscillate_applies_sine_of_delta() {
        let mut device = device();
        let desc = SceneObjectDesc::new("skull", "skull.x", Vec3::zeros()).with_animation(Animation::Oscillate);
        let mut object = SceneObject::load(&mut device, &desc).unwrap();
        let prior = object.rotation();

        object.advance(0.5);

        let delta = prior.inverse() * object.rotation();
        assert_relative_eq!(delta.angle(), 0.5f32.sin(), epsilon = 1e-5);
    }

    #[test]
    fn test_static_object_does_not_move() {
        let mut device = device();
        let desc = SceneObjectDesc::new("dwarf", "skull.x", Vec3::zeros());
        let mut object = SceneObject::load(&mut device, &desc).unwrap();
        let prior = object.transform().clone();

        object.advance(0.5);
        assert_eq!(object.transform(), &prior);
    }

    #[test]
    fn test_facing_backwards_turns_half_circle() {
        let mut device = device();
        let mut desc = SceneObjectDesc::new("skull", "skull.x", Vec3::zeros());
        desc.facing = Vec3::new(0.0, 0.0, -1.0);
        let object = SceneObject::load(&mut device, &desc).unwrap();

        let forward = object.rotation() * Vec3::z();
        assert_relative_eq!(forward.z, -1.0, epsilon = 1e-5);
    }
}
