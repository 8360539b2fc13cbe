//! Central collision data: shape registry and per-step scratch storage
//!
//! One instance per collision system. The registry arrays are parallel
//! vectors indexed by shape id; the scratch containers are cleared (not
//! reallocated) at the start of each step. All pipeline phases borrow this
//! struct for the duration of the phase only.

use crate::contact::Contact;
use crate::error::CollisionError;
use crate::foundation::math::{Pose, Quat, Vec3};
use crate::shapes::{Aabb, CollisionShape};

/// Stable identifier of a registered collision shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub(crate) u32);

impl ShapeId {
    /// The id as an index into the registry arrays
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shape#{}", self.0)
    }
}

/// Opaque identifier of a body owned by the dynamics system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(u32);

impl BodyId {
    /// Create a body id from the dynamics system's integer handle
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// The id as an index into the body arrays
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

/// Shape registry plus step-scratch storage
///
/// Owned exclusively by the collision system; the AABB generator,
/// broadphase and narrowphase borrow views of it one phase at a time.
#[derive(Default)]
pub struct CollisionData {
    // Per-shape arrays, indexed by shape id.
    pub(crate) shapes: Vec<CollisionShape>,
    pub(crate) shape_body: Vec<BodyId>,
    pub(crate) shape_offset: Vec<Pose>,
    pub(crate) shape_family: Vec<u32>,
    pub(crate) shape_family_mask: Vec<u32>,
    pub(crate) aabbs: Vec<Aabb>,
    pub(crate) shape_active: Vec<bool>,

    // Per-body arrays, indexed by body id. Grown on demand when a shape
    // referencing a new body is registered.
    pub(crate) body_pose: Vec<Pose>,
    pub(crate) body_active: Vec<bool>,

    // Step scratch, cleared at the start of each run.
    pub(crate) pairs: Vec<(ShapeId, ShapeId)>,
    pub(crate) contacts: Vec<Contact>,
    pub(crate) body_aabbs: Vec<Aabb>,
    pub(crate) body_step_active: Vec<bool>,
}

impl CollisionData {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shape; append-only, O(1) amortized
    ///
    /// Validates the geometry and fails on malformed shapes or on id-space
    /// exhaustion (both configuration errors).
    pub(crate) fn register(
        &mut self,
        body: BodyId,
        shape: CollisionShape,
        offset: Pose,
        family: u32,
        family_mask: u32,
    ) -> Result<ShapeId, CollisionError> {
        shape.validate()?;
        let id = u32::try_from(self.shapes.len()).map_err(|_| CollisionError::IdSpaceExhausted)?;
        if id == u32::MAX {
            return Err(CollisionError::IdSpaceExhausted);
        }
        self.ensure_body(body);
        self.shapes.push(shape);
        self.shape_body.push(body);
        self.shape_offset.push(offset);
        self.shape_family.push(family);
        self.shape_family_mask.push(family_mask);
        self.aabbs.push(Aabb::inverted());
        self.shape_active.push(true);
        Ok(ShapeId(id))
    }

    /// Shape removal is not supported; the registry is append-only for the
    /// lifetime of the system
    pub(crate) fn unregister(&mut self, _shape: ShapeId) -> Result<(), CollisionError> {
        Err(CollisionError::RemovalUnsupported)
    }

    /// Update a body's world pose for the coming step
    pub(crate) fn set_body_pose(&mut self, body: BodyId, position: Vec3, rotation: Quat) {
        self.ensure_body(body);
        self.body_pose[body.index()] = Pose::from_position_rotation(position, rotation);
    }

    /// Update a body's user-controlled active flag
    pub(crate) fn set_body_active(&mut self, body: BodyId, active: bool) {
        self.ensure_body(body);
        self.body_active[body.index()] = active;
    }

    /// Number of registered shapes
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Number of known bodies (highest registered body id + 1)
    pub fn body_count(&self) -> usize {
        self.body_pose.len()
    }

    /// The shape descriptor for an id
    pub fn shape(&self, id: ShapeId) -> &CollisionShape {
        &self.shapes[id.index()]
    }

    /// The body owning a shape
    pub fn body_of(&self, id: ShapeId) -> BodyId {
        self.shape_body[id.index()]
    }

    /// The shape's world AABB as of the last step
    pub fn aabb(&self, id: ShapeId) -> &Aabb {
        &self.aabbs[id.index()]
    }

    /// World pose of a shape: body pose composed with the local offset
    pub(crate) fn shape_world_pose(&self, id: ShapeId) -> Pose {
        let body = self.shape_body[id.index()];
        self.body_pose[body.index()].compose(&self.shape_offset[id.index()])
    }

    /// Clear the step scratch containers, retaining their allocations
    pub(crate) fn clear_step_scratch(&mut self) {
        self.pairs.clear();
        self.contacts.clear();
        self.body_aabbs.clear();
        self.body_step_active.clear();
    }

    /// Grow the body arrays to cover `body`
    fn ensure_body(&mut self, body: BodyId) {
        let needed = body.index() + 1;
        if self.body_pose.len() < needed {
            self.body_pose.resize(needed, Pose::identity());
            self.body_active.resize(needed, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::CollisionFamilies;

    #[test]
    fn test_register_assigns_sequential_ids() {
        let mut data = CollisionData::new();
        let a = data
            .register(
                BodyId::new(0),
                CollisionShape::sphere(1.0),
                Pose::identity(),
                CollisionFamilies::DEFAULT,
                CollisionFamilies::ALL,
            )
            .unwrap();
        let b = data
            .register(
                BodyId::new(1),
                CollisionShape::sphere(1.0),
                Pose::identity(),
                CollisionFamilies::DEFAULT,
                CollisionFamilies::ALL,
            )
            .unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(data.shape_count(), 2);
        assert_eq!(data.body_count(), 2);
    }

    #[test]
    fn test_register_rejects_malformed_geometry() {
        let mut data = CollisionData::new();
        let result = data.register(
            BodyId::new(0),
            CollisionShape::sphere(-1.0),
            Pose::identity(),
            CollisionFamilies::DEFAULT,
            CollisionFamilies::ALL,
        );
        assert!(matches!(result, Err(CollisionError::MalformedShape(_))));
        assert_eq!(data.shape_count(), 0);
    }

    #[test]
    fn test_unregister_is_unsupported() {
        let mut data = CollisionData::new();
        let id = data
            .register(
                BodyId::new(0),
                CollisionShape::sphere(1.0),
                Pose::identity(),
                CollisionFamilies::DEFAULT,
                CollisionFamilies::ALL,
            )
            .unwrap();
        assert!(matches!(
            data.unregister(id),
            Err(CollisionError::RemovalUnsupported)
        ));
        // Registration is untouched.
        assert_eq!(data.shape_count(), 1);
    }

    #[test]
    fn test_body_arrays_grow_on_demand() {
        let mut data = CollisionData::new();
        data.set_body_pose(BodyId::new(5), Vec3::new(1.0, 0.0, 0.0), Quat::identity());
        assert_eq!(data.body_count(), 6);
        assert!(data.body_active[3]);
    }
}
