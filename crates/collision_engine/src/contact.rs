//! Contact records produced by the narrow phase

use crate::data::{BodyId, ShapeId};
use crate::foundation::math::Vec3;

/// A single contact between two collision shapes
///
/// Created fresh each step by the narrow phase and consumed by the solver
/// before the next step; there is no cross-step contact persistence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// First shape of the pair
    pub shape_a: ShapeId,
    /// Second shape of the pair
    pub shape_b: ShapeId,
    /// Body owning the first shape
    pub body_a: BodyId,
    /// Body owning the second shape
    pub body_b: BodyId,
    /// Contact point in world space
    pub point: Vec3,
    /// Unit contact normal, pointing from shape A toward shape B
    pub normal: Vec3,
    /// Penetration depth; positive when the shapes interpenetrate
    pub depth: f32,
    /// Effective contact curvature radius for the solver's stiffness model
    pub curvature_radius: f32,
}

/// Consumer of the per-step contact set
///
/// Implemented by the dynamics layer. The collision system makes no
/// assumption about how the sink stores or later resolves contacts, only
/// that `add_contact` is safe to call repeatedly during
/// [`crate::CollisionSystem::report_contacts`].
pub trait ContactSink {
    /// Receive one contact record
    fn add_contact(&mut self, contact: &Contact);
}

impl ContactSink for Vec<Contact> {
    fn add_contact(&mut self, contact: &Contact) {
        self.push(*contact);
    }
}
