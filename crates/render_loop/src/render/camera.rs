//! # 3D Camera System
//!
//! Look-at camera producing left-handed view and projection matrices with
//! depth mapped to [0, 1].
//!
//! ## Update Rules
//! - The view matrix is rebuilt by `render()`, once per frame, because the
//!   camera can move between frames.
//! - The projection matrix only depends on the lens and the aspect ratio.
//!   Changing either marks it dirty and the next query rebuilds it.

use thiserror::Error;

use crate::foundation::math::{utils, Mat4, Mat4Ext, Point, Vec3};

/// Camera parameter errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    /// Output surface has a zero dimension
    #[error("Invalid aspect ratio for surface {width}x{height}")]
    InvalidAspectRatio {
        /// Surface width
        width: u32,
        /// Surface height
        height: u32,
    },

    /// A vector parameter contained NaN or infinity
    #[error("Non-finite camera {field}: {value:?}")]
    NonFinite {
        /// Which parameter was rejected
        field: &'static str,
        /// The rejected value
        value: [f32; 3],
    },

    /// Lens parameters out of range
    #[error("Invalid lens: fov {fov_degrees} degrees, near {near}, far {far}")]
    InvalidLens {
        /// Field of view in degrees
        fov_degrees: f32,
        /// Near plane distance
        near: f32,
        /// Far plane distance
        far: f32,
    },
}

/// 3D camera for perspective projection
///
/// # Coordinate System
/// Left-handed, Y-up: X+ right, Y+ up, Z+ into the screen.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    target: Vec3,
    up: Vec3,
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,

    view: Mat4,
    projection: Mat4,
    projection_dirty: bool,
    view_revision: u64,
}

impl Camera {
    /// Create a new perspective camera looking at the origin
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Aspect ratio (width / height) of the viewport
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov: utils::deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
            view: Mat4::identity(),
            projection: Mat4::identity(),
            projection_dirty: true,
            view_revision: 0,
        };
        camera.rebuild_view();
        camera
    }

    /// Move the camera
    pub fn set_position(&mut self, position: Vec3) -> Result<(), CameraError> {
        self.position = finite("position", position)?;
        log::trace!("Camera position updated to: {:?}", position);
        Ok(())
    }

    /// Change the look-at point
    pub fn set_target(&mut self, target: Vec3) -> Result<(), CameraError> {
        self.target = finite("target", target)?;
        log::trace!("Camera target updated to: {:?}", target);
        Ok(())
    }

    /// Set the up vector that orients the camera around its view axis
    pub fn set_rotation(&mut self, up: Vec3) -> Result<(), CameraError> {
        self.up = finite("up", up)?;
        log::trace!("Camera up vector updated to: {:?}", up);
        Ok(())
    }

    /// Replace field of view and clipping planes
    pub fn set_lens(&mut self, fov_degrees: f32, near: f32, far: f32) -> Result<(), CameraError> {
        let valid = fov_degrees > 0.0 && fov_degrees < 180.0 && near > 0.0 && far > near;
        if !valid || !far.is_finite() {
            return Err(CameraError::InvalidLens { fov_degrees, near, far });
        }
        self.fov = utils::deg_to_rad(fov_degrees);
        self.near = near;
        self.far = far;
        self.projection_dirty = true;
        Ok(())
    }

    /// Recompute the aspect ratio from output surface dimensions
    ///
    /// A zero dimension leaves the previous aspect ratio in place.
    pub fn set_aspect_ratio(&mut self, width: u32, height: u32) -> Result<f32, CameraError> {
        if width == 0 || height == 0 {
            return Err(CameraError::InvalidAspectRatio { width, height });
        }

        #[allow(clippy::cast_precision_loss)]
        let aspect = width as f32 / height as f32;
        if (self.aspect - aspect).abs() > 0.01 {
            log::info!("Camera aspect ratio changed: {:.3} -> {:.3}", self.aspect, aspect);
        }
        self.aspect = aspect;
        self.projection_dirty = true;
        Ok(aspect)
    }

    /// Rebuild the view matrix from position, target and up
    ///
    /// Must run once per frame before anything is drawn.
    pub fn render(&mut self) {
        self.rebuild_view();
        self.view_revision += 1;
    }

    fn rebuild_view(&mut self) {
        self.view = Mat4::look_at_lh(&Point::from(self.position), &Point::from(self.target), &self.up);
    }

    /// Current view matrix
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    /// Projection matrix, rebuilt first if the lens or aspect changed
    pub fn projection(&mut self) -> &Mat4 {
        if self.projection_dirty {
            self.projection = Mat4::perspective_lh(self.fov, self.aspect, self.near, self.far);
            self.projection_dirty = false;
        }
        &self.projection
    }

    /// Combined view-projection matrix
    pub fn view_projection(&mut self) -> Mat4 {
        let projection = *self.projection();
        projection * self.view
    }

    /// Number of times `render()` has rebuilt the view
    pub fn view_revision(&self) -> u64 {
        self.view_revision
    }

    /// Camera position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Look-at point
    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Up vector
    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Vertical field of view in radians
    pub fn fov(&self) -> f32 {
        self.fov
    }

    /// Width over height
    pub fn aspect_ratio(&self) -> f32 {
        self.aspect
    }

    /// Near plane distance
    pub fn near(&self) -> f32 {
        self.near
    }

    /// Far plane distance
    pub fn far(&self) -> f32 {
        self.far
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(Vec3::new(0.0, 0.0, -10.0), 45.0, 4.0 / 3.0, 1.0, 1000.0)
    }
}

fn finite(field: &'static str, value: Vec3) -> Result<Vec3, CameraError> {
    if utils::is_finite(&value) {
        Ok(value)
    } else {
        Err(CameraError::NonFinite {
            field,
            value: [value.x, value.y, value.z],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_height_keeps_previous_aspect() {
        let mut camera = Camera::default();
        camera.set_aspect_ratio(1920, 1080).unwrap();

        let err = camera.set_aspect_ratio(640, 0).unwrap_err();
        assert_eq!(err, CameraError::InvalidAspectRatio { width: 640, height: 0 });
        assert_relative_eq!(camera.aspect_ratio(), 1920.0 / 1080.0, epsilon = 1e-6);
    }

    #[test]
    fn test_projection_rebuilt_after_aspect_change() {
        let mut camera = Camera::default();
        let before = *camera.projection();

        camera.set_aspect_ratio(1000, 250).unwrap();
        let after = *camera.projection();

        assert_ne!(before, after);
        assert_relative_eq!(after[(1, 1)] / after[(0, 0)], 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_non_finite_setters_rejected() {
        let mut camera = Camera::default();
        let original = camera.position();

        assert!(camera.set_position(Vec3::new(f32::NAN, 0.0, 0.0)).is_err());
        assert!(camera.set_target(Vec3::new(0.0, f32::INFINITY, 0.0)).is_err());
        assert!(camera.set_rotation(Vec3::new(0.0, 0.0, f32::NEG_INFINITY)).is_err());
        assert_eq!(camera.position(), original);
    }

    #[test]
    fn test_render_counts_view_rebuilds() {
        let mut camera = Camera::default();
        camera.set_target(Vec3::new(0.0, 3.0, 0.0)).unwrap();
        assert_eq!(camera.view_revision(), 0);

        camera.render();
        assert_eq!(camera.view_revision(), 1);

        // The look-at point lands on the view's +Z axis at the eye distance
        let target = camera.view() * Vec3::new(0.0, 3.0, 0.0).push(1.0);
        assert_relative_eq!(target.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(target.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(target.z, 109f32.sqrt(), epsilon = 1e-4);
    }

    #[test]
    fn test_invalid_lens_rejected() {
        let mut camera = Camera::default();
        assert!(camera.set_lens(45.0, 10.0, 1.0).is_err());
        assert!(camera.set_lens(0.0, 1.0, 10.0).is_err());
        assert!(camera.set_lens(60.0, 0.5, 500.0).is_ok());
        assert_relative_eq!(camera.fov(), 60f32.to_radians(), epsilon = 1e-6);
    }
}
