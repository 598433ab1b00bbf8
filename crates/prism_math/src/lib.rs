// Re-export glam for convenience
pub use glam::*;

// Prism math types
mod camera;
mod transform;
pub use camera::{Camera, CameraSpeed, CameraUniform, MoveDirection};
pub use transform::ModelTransform;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_creation() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }

    #[test]
    fn test_reexported_transform_is_usable() {
        let mut t = ModelTransform::new();
        t.translate(Vec3::X);
        assert_eq!(t.take().transform_point3(Vec3::ZERO), Vec3::X);
    }
}
