//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the left-handed matrix builders the
//! render loop needs. Matrices use column vectors: `clip = P * V * W * v`.

pub use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point = Point3<f32>;

/// Quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Convert to a transformation matrix (scale, then rotate, then translate)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Math utility functions
pub mod utils {
    use super::Vec3;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// Whether every component of the vector is finite
    pub fn is_finite(v: &Vec3) -> bool {
        v.iter().all(|c| c.is_finite())
    }
}

/// Extension trait for Mat4 with a left-handed projection builder
///
/// The matching view matrix comes from nalgebra's `Matrix4::look_at_lh`.
pub trait Mat4Ext {
    /// Create a left-handed perspective projection matrix with depth in [0, 1]
    fn perspective_lh(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective_lh(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        // P = [ys/a  0   0          0         ]
        //     [0     ys  0          0         ]
        //     [0     0   f/(f-n)   -nf/(f-n)  ]
        //     [0     0   1          0         ]
        let y_scale = 1.0 / (fov_y * 0.5).tan();
        let x_scale = y_scale / aspect;
        let depth = far / (far - near);

        let mut result = Mat4::zeros();
        result[(0, 0)] = x_scale;
        result[(1, 1)] = y_scale;
        result[(2, 2)] = depth;
        result[(2, 3)] = -near * depth;
        result[(3, 2)] = 1.0;
        result
    }
}
