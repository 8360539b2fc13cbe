//! Closed-form intersection tests for sphere and capsule pairs
//!
//! These pairs have exact analytic contact solutions, so they bypass the
//! iterative support-mapping path entirely. All routines are envelope
//! aware: they detect shapes separated by up to `envelope` and report the
//! (negative) depth, leaving the final tolerance filtering to the
//! dispatcher.

use crate::foundation::math::{Pose, Vec3};
use crate::narrowphase::GeomContact;

/// Sphere vs sphere
///
/// The contact point sits midway through the overlap region along the
/// center line; two touching spheres report depth exactly zero with the
/// contact at the tangent point.
pub(crate) fn sphere_sphere(
    center_a: Vec3,
    radius_a: f32,
    center_b: Vec3,
    radius_b: f32,
    envelope: f32,
) -> Option<GeomContact> {
    let delta = center_b - center_a;
    let dist_sq = delta.norm_squared();
    let radius_sum = radius_a + radius_b;
    let reach = radius_sum + envelope;
    if dist_sq > reach * reach {
        return None;
    }

    let dist = dist_sq.sqrt();
    // Coincident centers have no meaningful normal; pick an arbitrary one.
    let normal = if dist > 1e-10 { delta / dist } else { Vec3::x() };
    let depth = radius_sum - dist;
    let point = center_a + normal * (radius_a - depth * 0.5);
    Some(GeomContact { point, normal, depth })
}

/// Sphere (A) vs capsule (B)
pub(crate) fn sphere_capsule(
    sphere_center: Vec3,
    sphere_radius: f32,
    capsule_pose: &Pose,
    capsule_radius: f32,
    capsule_half_length: f32,
    envelope: f32,
) -> Option<GeomContact> {
    let p0 = capsule_pose.transform_point(Vec3::new(0.0, -capsule_half_length, 0.0));
    let p1 = capsule_pose.transform_point(Vec3::new(0.0, capsule_half_length, 0.0));
    let on_segment = closest_point_on_segment(sphere_center, p0, p1);
    sphere_sphere(sphere_center, sphere_radius, on_segment, capsule_radius, envelope)
}

/// Capsule (A) vs capsule (B)
pub(crate) fn capsule_capsule(
    pose_a: &Pose,
    radius_a: f32,
    half_length_a: f32,
    pose_b: &Pose,
    radius_b: f32,
    half_length_b: f32,
    envelope: f32,
) -> Option<GeomContact> {
    let a0 = pose_a.transform_point(Vec3::new(0.0, -half_length_a, 0.0));
    let a1 = pose_a.transform_point(Vec3::new(0.0, half_length_a, 0.0));
    let b0 = pose_b.transform_point(Vec3::new(0.0, -half_length_b, 0.0));
    let b1 = pose_b.transform_point(Vec3::new(0.0, half_length_b, 0.0));
    let (on_a, on_b) = closest_points_on_segments(a0, a1, b0, b1);
    sphere_sphere(on_a, radius_a, on_b, radius_b, envelope)
}

/// Sphere (A) vs cuboid (B)
pub(crate) fn sphere_cuboid(
    sphere_center: Vec3,
    sphere_radius: f32,
    cuboid_pose: &Pose,
    half_extents: Vec3,
    envelope: f32,
) -> Option<GeomContact> {
    let local = cuboid_pose.inverse_transform_point(sphere_center);
    let clamped = Vec3::new(
        local.x.clamp(-half_extents.x, half_extents.x),
        local.y.clamp(-half_extents.y, half_extents.y),
        local.z.clamp(-half_extents.z, half_extents.z),
    );
    let delta = local - clamped;
    let dist_sq = delta.norm_squared();

    if dist_sq > 1e-12 {
        // Center outside the box: closest point is on the surface.
        let reach = sphere_radius + envelope;
        if dist_sq > reach * reach {
            return None;
        }
        let dist = dist_sq.sqrt();
        let depth = sphere_radius - dist;
        // From the sphere toward the box surface.
        let normal = cuboid_pose.transform_vector(-delta / dist);
        let point = sphere_center + normal * (sphere_radius - depth * 0.5);
        return Some(GeomContact { point, normal, depth });
    }

    // Center inside the box: push out through the nearest face.
    let mut axis = 0;
    let mut min_gap = f32::MAX;
    for k in 0..3 {
        let gap = half_extents[k] - local[k].abs();
        if gap < min_gap {
            min_gap = gap;
            axis = k;
        }
    }
    let mut local_normal = Vec3::zeros();
    // Toward the box interior, i.e. away from the nearest face.
    local_normal[axis] = if local[axis] >= 0.0 { -1.0 } else { 1.0 };
    let normal = cuboid_pose.transform_vector(local_normal);
    let depth = sphere_radius + min_gap;
    let point = sphere_center + normal * (sphere_radius - depth * 0.5);
    Some(GeomContact { point, normal, depth })
}

/// Closest point on the segment `[a, b]` to `point`
pub(crate) fn closest_point_on_segment(point: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < 1e-12 {
        return a;
    }
    let t = ((point - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Closest points between the segments `[p1, q1]` and `[p2, q2]`
///
/// Ericson, Real-Time Collision Detection, section 5.1.9.
pub(crate) fn closest_points_on_segments(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);

    let s: f32;
    let t: f32;
    if a < 1e-12 && e < 1e-12 {
        return (p1, p2); // both segments degenerate
    }
    if a < 1e-12 {
        s = 0.0;
        t = (f / e).clamp(0.0, 1.0);
    } else {
        let c = d1.dot(&r);
        if e < 1e-12 {
            t = 0.0;
            s = (-c / a).clamp(0.0, 1.0);
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            let mut s_val = if denom > 1e-12 {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0 // parallel segments
            };
            let mut t_val = (b * s_val + f) / e;
            if t_val < 0.0 {
                t_val = 0.0;
                s_val = (-c / a).clamp(0.0, 1.0);
            } else if t_val > 1.0 {
                t_val = 1.0;
                s_val = ((b - c) / a).clamp(0.0, 1.0);
            }
            s = s_val;
            t = t_val;
        }
    }
    (p1 + d1 * s, p2 + d2 * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use approx::assert_relative_eq;

    #[test]
    fn test_touching_unit_spheres() {
        let contact =
            sphere_sphere(Vec3::zeros(), 1.0, Vec3::new(2.0, 0.0, 0.0), 1.0, 0.0).unwrap();
        assert_relative_eq!(contact.point, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(contact.normal, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(contact.depth, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_overlapping_unit_spheres() {
        let contact =
            sphere_sphere(Vec3::zeros(), 1.0, Vec3::new(1.0, 0.0, 0.0), 1.0, 0.0).unwrap();
        assert_relative_eq!(contact.normal, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(contact.depth, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_separated_spheres_none_without_envelope() {
        assert!(sphere_sphere(Vec3::zeros(), 1.0, Vec3::new(2.5, 0.0, 0.0), 1.0, 0.0).is_none());
    }

    #[test]
    fn test_envelope_reports_negative_depth() {
        let contact =
            sphere_sphere(Vec3::zeros(), 1.0, Vec3::new(2.2, 0.0, 0.0), 1.0, 0.5).unwrap();
        assert!(contact.depth < 0.0);
        assert_relative_eq!(contact.depth, -0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_capsule_side_contact() {
        // Upright capsule at origin, sphere approaching from +x.
        let capsule_pose = Pose::identity();
        let contact = sphere_capsule(
            Vec3::new(1.2, 0.5, 0.0),
            0.5,
            &capsule_pose,
            0.8,
            1.0,
            0.0,
        )
        .unwrap();
        // Closest segment point is (0, 0.5, 0); normal from the sphere
        // toward the capsule axis is -x.
        assert_relative_eq!(contact.normal, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(contact.depth, 0.1, epsilon = 1e-5);
    }

    #[test]
    fn test_capsule_capsule_crossed() {
        // Two capsules crossing at right angles, overlapping at the middle.
        let pose_a = Pose::identity();
        let pose_b = Pose::from_position_rotation(
            Vec3::new(0.0, 0.0, 0.7),
            Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2),
        );
        let contact = capsule_capsule(&pose_a, 0.4, 1.0, &pose_b, 0.4, 1.0, 0.0).unwrap();
        assert_relative_eq!(contact.normal, Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-4);
        assert_relative_eq!(contact.depth, 0.1, epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_cuboid_face_contact() {
        let cuboid_pose = Pose::identity();
        let contact = sphere_cuboid(
            Vec3::new(1.3, 0.0, 0.0),
            0.5,
            &cuboid_pose,
            Vec3::new(1.0, 1.0, 1.0),
            0.0,
        )
        .unwrap();
        // Sphere is A; normal points from the sphere toward the box.
        assert_relative_eq!(contact.normal, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(contact.depth, 0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_center_inside_cuboid() {
        let cuboid_pose = Pose::identity();
        let contact = sphere_cuboid(
            Vec3::new(0.8, 0.0, 0.0),
            0.3,
            &cuboid_pose,
            Vec3::new(1.0, 1.0, 1.0),
            0.0,
        )
        .unwrap();
        // Nearest face is +x; push-out normal (A toward B) points -x.
        assert_relative_eq!(contact.normal, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(contact.depth, 0.3 + 0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_cuboid_miss() {
        assert!(sphere_cuboid(
            Vec3::new(3.0, 0.0, 0.0),
            0.5,
            &Pose::identity(),
            Vec3::new(1.0, 1.0, 1.0),
            0.0,
        )
        .is_none());
    }

    #[test]
    fn test_closest_points_on_parallel_segments() {
        let (a, b) = closest_points_on_segments(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
            Vec3::new(3.0, 1.0, 0.0),
        );
        assert_relative_eq!(a, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(b, Vec3::new(2.0, 1.0, 0.0), epsilon = 1e-6);
    }
}
