// Composite transform accumulated by scene `translate`/`rotate`/`scale`
// operations and consumed by `load`.

use glam::{Mat4, Vec3};

/// Post-multiplying transform builder.
///
/// Each operation is applied as `M = M * op`, so the operation written last
/// in a scene file is the first one applied to the model's vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelTransform {
    matrix: Mat4,
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelTransform {
    pub fn new() -> Self {
        Self { matrix: Mat4::IDENTITY }
    }

    pub fn translate(&mut self, offset: Vec3) -> &mut Self {
        self.matrix *= Mat4::from_translation(offset);
        self
    }

    /// Rotate by `degrees` around `axis`. The axis is normalized here; a
    /// zero axis leaves the transform untouched.
    pub fn rotate(&mut self, degrees: f32, axis: Vec3) -> &mut Self {
        if let Some(axis) = axis.try_normalize() {
            self.matrix *= Mat4::from_axis_angle(axis, degrees.to_radians());
        }
        self
    }

    pub fn scale(&mut self, factors: Vec3) -> &mut Self {
        self.matrix *= Mat4::from_scale(factors);
        self
    }

    /// Current matrix without resetting
    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    /// Return the accumulated matrix and reset to identity
    pub fn take(&mut self) -> Mat4 {
        std::mem::replace(&mut self.matrix, Mat4::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_identity_by_default() {
        assert_eq!(ModelTransform::default().matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_post_multiply_order() {
        // translate then scale: the scale applies to the point first
        let mut t = ModelTransform::new();
        t.translate(Vec3::new(10.0, 0.0, 0.0)).scale(Vec3::splat(2.0));
        let p = t.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(12.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_rotate_degrees() {
        let mut t = ModelTransform::new();
        t.rotate(90.0, Vec3::new(0.0, 0.0, 5.0));
        let expected = Mat4::from_rotation_z(FRAC_PI_2);
        let p = t.matrix().transform_point3(Vec3::X);
        assert!((p - expected.transform_point3(Vec3::X)).length() < 1e-5);
        assert!((p - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_zero_axis_is_ignored() {
        let mut t = ModelTransform::new();
        t.rotate(45.0, Vec3::ZERO);
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_take_resets() {
        let mut t = ModelTransform::new();
        t.translate(Vec3::ONE);
        let m = t.take();
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::ONE);
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }
}
