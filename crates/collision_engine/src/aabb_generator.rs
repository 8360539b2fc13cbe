//! Parallel world-space AABB generation
//!
//! First phase of every collision step: each registered shape computes its
//! world AABB from the owning body's pose composed with the shape's local
//! offset, and writes only its own slot in the AABB array. No shared
//! mutable state, so the loop runs fully in parallel.

use rayon::prelude::*;

use crate::data::CollisionData;
use crate::shapes::Aabb;

/// Recompute every shape's world AABB, inflated by the collision envelope
pub(crate) fn generate_world_aabbs(data: &mut CollisionData, envelope: f32) {
    let CollisionData {
        shapes,
        shape_body,
        shape_offset,
        body_pose,
        aabbs,
        ..
    } = data;
    let shapes = &*shapes;
    let shape_body = &*shape_body;
    let shape_offset = &*shape_offset;
    let body_pose = &*body_pose;

    aabbs.par_iter_mut().enumerate().for_each(|(i, slot)| {
        let body = shape_body[i];
        let pose = body_pose[body.index()].compose(&shape_offset[i]);
        *slot = shapes[i].world_aabb(&pose).inflated(envelope);
    });
}

/// Union each body's shape AABBs into the per-body AABB scratch array
///
/// Bodies with no shapes keep the inverted box, which intersects nothing.
pub(crate) fn compute_body_aabbs(data: &mut CollisionData) {
    let body_count = data.body_pose.len();
    data.body_aabbs.clear();
    data.body_aabbs.resize(body_count, Aabb::inverted());
    for (i, aabb) in data.aabbs.iter().enumerate() {
        data.body_aabbs[data.shape_body[i].index()].merge(aabb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BodyId;
    use crate::families::CollisionFamilies;
    use crate::foundation::math::{Pose, Quat, Vec3};
    use crate::shapes::CollisionShape;
    use approx::assert_relative_eq;

    fn register(data: &mut CollisionData, body: u32, shape: CollisionShape, offset: Pose) {
        data.register(
            BodyId::new(body),
            shape,
            offset,
            CollisionFamilies::DEFAULT,
            CollisionFamilies::ALL,
        )
        .unwrap();
    }

    #[test]
    fn test_aabb_follows_body_pose() {
        let mut data = CollisionData::new();
        register(&mut data, 0, CollisionShape::sphere(1.0), Pose::identity());
        data.set_body_pose(BodyId::new(0), Vec3::new(5.0, 0.0, 0.0), Quat::identity());

        generate_world_aabbs(&mut data, 0.0);
        let aabb = data.aabbs[0];
        assert_relative_eq!(aabb.center(), Vec3::new(5.0, 0.0, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn test_envelope_inflates_aabb() {
        let mut data = CollisionData::new();
        register(&mut data, 0, CollisionShape::sphere(1.0), Pose::identity());

        generate_world_aabbs(&mut data, 0.25);
        let aabb = data.aabbs[0];
        assert!(aabb.extents().x >= 1.25 - 1e-4);
        assert!(aabb.extents().x <= 1.25 + 1e-3);
    }

    #[test]
    fn test_shape_offset_is_applied() {
        let mut data = CollisionData::new();
        register(
            &mut data,
            0,
            CollisionShape::sphere(0.5),
            Pose::from_position(Vec3::new(0.0, 2.0, 0.0)),
        );
        data.set_body_pose(BodyId::new(0), Vec3::new(1.0, 0.0, 0.0), Quat::identity());

        generate_world_aabbs(&mut data, 0.0);
        assert_relative_eq!(
            data.aabbs[0].center(),
            Vec3::new(1.0, 2.0, 0.0),
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_body_aabb_unions_all_shapes() {
        let mut data = CollisionData::new();
        register(&mut data, 0, CollisionShape::sphere(1.0), Pose::identity());
        register(
            &mut data,
            0,
            CollisionShape::sphere(1.0),
            Pose::from_position(Vec3::new(4.0, 0.0, 0.0)),
        );

        generate_world_aabbs(&mut data, 0.0);
        compute_body_aabbs(&mut data);

        let body_aabb = data.body_aabbs[0];
        assert!(body_aabb.min.x <= -1.0 + 1e-3);
        assert!(body_aabb.max.x >= 5.0 - 1e-3);
    }
}
