//! Lighting system

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;
use crate::render::device::Color;

/// Directional light shared by both effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    /// Direction the light travels, normalized by `new`
    pub direction: Vec3,
    /// Ambient term
    pub ambient: Color,
    /// Diffuse term
    pub diffuse: Color,
    /// Specular term
    pub specular: Color,
}

impl DirectionalLight {
    /// Create a directional light
    pub fn new(direction: Vec3, ambient: Color, diffuse: Color, specular: Color) -> Self {
        Self {
            direction: direction.normalize(),
            ambient,
            diffuse,
            specular,
        }
    }

    /// Copy of this light with a unit-length direction
    ///
    /// A zero direction is left untouched rather than turned into NaNs.
    pub fn normalized(&self) -> Self {
        let mut light = self.clone();
        if let Some(direction) = self.direction.try_normalize(f32::EPSILON) {
            light.direction = direction;
        }
        light
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(
            Vec3::new(0.0, 1.0, 2.0),
            Color::gray(0.5),
            Color::gray(0.8),
            Color::gray(0.8),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_direction_is_unit_length() {
        let light = DirectionalLight::default();
        assert_relative_eq!(light.direction.norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(light.direction.z / light.direction.y, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_normalized_keeps_zero_direction() {
        let mut light = DirectionalLight::default();
        light.direction = Vec3::zeros();
        assert_eq!(light.normalized().direction, Vec3::zeros());
    }
}
