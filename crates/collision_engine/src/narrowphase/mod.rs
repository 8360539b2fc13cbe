//! Narrow-phase collision detection: exact per-pair contact generation
//!
//! Candidate pairs from the broadphase are dispatched by their shape-type
//! pair to an exact routine. The work is embarrassingly parallel: no
//! pair's computation depends on another's, and every pair writes into its
//! own pre-allocated output slot; the final contact list is the
//! concatenation of the non-empty slots.

mod closed_form;
mod cuboid;
mod gjk;

use rayon::prelude::*;

use crate::contact::Contact;
use crate::data::CollisionData;
use crate::foundation::math::{Pose, Vec3};
use crate::settings::CollisionSettings;
use crate::shapes::CollisionShape;

/// Geometric result of one exact intersection test, before shape ids and
/// solver metadata are attached
#[derive(Debug, Clone, Copy)]
pub(crate) struct GeomContact {
    /// World contact point
    pub point: Vec3,
    /// Unit normal, from shape A toward shape B
    pub normal: Vec3,
    /// Penetration depth; positive when interpenetrating
    pub depth: f32,
}

/// Run the narrow phase over all candidate pairs, filling `data.contacts`
///
/// A pair whose AABB overlap was a false positive simply produces no
/// contacts; failure isolation is at pair granularity. Contacts more
/// separated than the configured tolerance are dropped.
pub(crate) fn dispatch_all(data: &mut CollisionData, settings: &CollisionSettings) {
    let CollisionData {
        shapes,
        shape_body,
        shape_offset,
        body_pose,
        pairs,
        contacts,
        ..
    } = data;
    let shapes = &*shapes;
    let shape_body = &*shape_body;
    let shape_offset = &*shape_offset;
    let body_pose = &*body_pose;

    // Count-then-fill: each pair computes into its own slot, then the
    // slots are compacted into the flat contact list.
    let slots: Vec<Vec<Contact>> = pairs
        .par_iter()
        .map(|&(a, b)| {
            let (ia, ib) = (a.index(), b.index());
            let body_a = shape_body[ia];
            let body_b = shape_body[ib];
            let pose_a = body_pose[body_a.index()].compose(&shape_offset[ia]);
            let pose_b = body_pose[body_b.index()].compose(&shape_offset[ib]);
            let geoms = dispatch_pair(&shapes[ia], &pose_a, &shapes[ib], &pose_b, settings);

            geoms
                .into_iter()
                .filter(|g| g.depth >= -settings.separation_tolerance)
                .map(|g| Contact {
                    shape_a: a,
                    shape_b: b,
                    body_a,
                    body_b,
                    point: g.point,
                    normal: g.normal,
                    depth: g.depth,
                    curvature_radius: combined_curvature_radius(
                        &shapes[ia],
                        &shapes[ib],
                        settings.default_curvature_radius,
                    ),
                })
                .collect()
        })
        .collect();

    contacts.clear();
    for slot in slots {
        contacts.extend(slot);
    }
}

/// Exact test for one candidate pair, selected by the shape-type pair
///
/// Sphere and capsule combinations use closed forms; cuboid-cuboid uses
/// SAT with face clipping (up to 4 contacts); every remaining convex
/// combination goes through the GJK/EPA support-mapping path.
fn dispatch_pair(
    shape_a: &CollisionShape,
    pose_a: &Pose,
    shape_b: &CollisionShape,
    pose_b: &Pose,
    settings: &CollisionSettings,
) -> Vec<GeomContact> {
    use CollisionShape::{Capsule, Cuboid, Sphere};

    let envelope = settings.envelope;
    match (shape_a, shape_b) {
        (Sphere { radius: ra }, Sphere { radius: rb }) => {
            closed_form::sphere_sphere(pose_a.position, *ra, pose_b.position, *rb, envelope)
                .into_iter()
                .collect()
        }
        (Sphere { radius }, Capsule { radius: rc, half_length }) => closed_form::sphere_capsule(
            pose_a.position,
            *radius,
            pose_b,
            *rc,
            *half_length,
            envelope,
        )
        .into_iter()
        .collect(),
        (Capsule { radius: rc, half_length }, Sphere { radius }) => flipped(
            closed_form::sphere_capsule(pose_b.position, *radius, pose_a, *rc, *half_length, envelope),
        ),
        (
            Capsule { radius: ra, half_length: la },
            Capsule { radius: rb, half_length: lb },
        ) => closed_form::capsule_capsule(pose_a, *ra, *la, pose_b, *rb, *lb, envelope)
            .into_iter()
            .collect(),
        (Sphere { radius }, Cuboid { half_extents }) => {
            closed_form::sphere_cuboid(pose_a.position, *radius, pose_b, *half_extents, envelope)
                .into_iter()
                .collect()
        }
        (Cuboid { half_extents }, Sphere { radius }) => flipped(closed_form::sphere_cuboid(
            pose_b.position,
            *radius,
            pose_a,
            *half_extents,
            envelope,
        )),
        (Cuboid { half_extents: ha }, Cuboid { half_extents: hb }) => {
            cuboid::cuboid_cuboid(pose_a, *ha, pose_b, *hb, envelope)
        }
        _ => gjk::contact(shape_a, pose_a, shape_b, pose_b)
            .into_iter()
            .collect(),
    }
}

/// Reverse the A/B roles of a contact computed with swapped arguments
fn flipped(contact: Option<GeomContact>) -> Vec<GeomContact> {
    contact
        .into_iter()
        .map(|mut c| {
            c.normal = -c.normal;
            c
        })
        .collect()
}

/// Effective curvature radius of a contact between two shapes
///
/// Two curved surfaces combine harmonically; one curved surface against a
/// flat one keeps its own radius; flat-on-flat falls back to the
/// configured default.
fn combined_curvature_radius(a: &CollisionShape, b: &CollisionShape, default: f32) -> f32 {
    match (a.curvature_radius(), b.curvature_radius()) {
        (Some(ra), Some(rb)) => ra * rb / (ra + rb),
        (Some(r), None) | (None, Some(r)) => r,
        (None, None) => default,
    }
}
