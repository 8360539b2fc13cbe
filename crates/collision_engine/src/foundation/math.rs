//! Math utilities and types
//!
//! Provides fundamental math types for 3D collision geometry.

pub use nalgebra::{Matrix3, Quaternion, Unit, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Rigid pose: position and orientation, no scale
///
/// Collision shapes are rigid, so body transforms and shape offsets are
/// pure isometries. Composition follows the usual convention:
/// `parent.compose(child)` maps child-local coordinates to the parent frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }
}

impl Pose {
    /// Create a new identity pose
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a pose with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a pose with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Map a point from this pose's local frame to the world frame
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point
    }

    /// Rotate a direction from this pose's local frame to the world frame
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Map a world-space point into this pose's local frame
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.position)
    }

    /// Rotate a world-space direction into this pose's local frame
    pub fn inverse_transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation.inverse() * vector
    }

    /// Compose with a child pose: the result maps child-local coordinates
    /// through `child` and then through `self`
    pub fn compose(&self, child: &Pose) -> Pose {
        Pose {
            position: self.transform_point(child.position),
            rotation: self.rotation * child.rotation,
        }
    }

    /// Rotation as a 3x3 matrix
    pub fn rotation_matrix(&self) -> Mat3 {
        self.rotation.to_rotation_matrix().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_pose_is_noop() {
        let pose = Pose::identity();
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(pose.transform_point(p), p);
        assert_relative_eq!(pose.inverse_transform_point(p), p);
    }

    #[test]
    fn test_transform_point_round_trip() {
        let rotation = Quat::from_axis_angle(&Vec3::y_axis(), 1.2);
        let pose = Pose::from_position_rotation(Vec3::new(4.0, -1.0, 0.5), rotation);
        let p = Vec3::new(-2.0, 3.0, 7.0);
        let back = pose.inverse_transform_point(pose.transform_point(p));
        assert_relative_eq!(back, p, epsilon = 1e-5);
    }

    #[test]
    fn test_compose_matches_sequential_transforms() {
        let body = Pose::from_position_rotation(
            Vec3::new(1.0, 0.0, 0.0),
            Quat::from_axis_angle(&Vec3::z_axis(), 0.5),
        );
        let offset = Pose::from_position(Vec3::new(0.0, 2.0, 0.0));
        let composed = body.compose(&offset);
        let p = Vec3::new(0.3, 0.4, 0.5);
        assert_relative_eq!(
            composed.transform_point(p),
            body.transform_point(offset.transform_point(p)),
            epsilon = 1e-6
        );
    }
}
