//! Core collision detection system
//!
//! Based on Game Engine Architecture 3rd Edition, Chapter 13:
//! "The collision detection system is typically split into two phases:
//! broad-phase and narrow-phase."
//!
//! The orchestrator owns the collision data and drives the per-step
//! pipeline: AABB generation, then broadphase, then narrowphase, each
//! phase internally parallel with a full barrier between phases. The
//! dynamics layer feeds body poses in before each step and drains the
//! contact set afterwards through a [`ContactSink`].
//!
//! The system has exactly two states: idle (no step in flight) and
//! running (inside [`CollisionSystem::run`]). Registration and pose
//! updates are only meaningful while idle; Rust's borrow rules enforce
//! the single-writer discipline, since `run` takes `&mut self`.

use std::time::Duration;

use crate::aabb_generator;
use crate::broadphase::Broadphase;
use crate::contact::{Contact, ContactSink};
use crate::data::{BodyId, CollisionData, ShapeId};
use crate::error::CollisionError;
use crate::families::CollisionFamilies;
use crate::foundation::math::{Pose, Quat, Vec3};
use crate::foundation::time::Stopwatch;
use crate::narrowphase;
use crate::settings::CollisionSettings;
use crate::shapes::{Aabb, CollisionShape};

/// Result of a ray intersection query
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    /// The shape that was hit
    pub shape: ShapeId,
    /// The point of intersection in world space
    pub point: Vec3,
    /// The surface normal at the intersection point
    pub normal: Vec3,
    /// The distance from the ray origin to the hit point
    pub distance: f32,
}

/// Parallel collision detection system
///
/// Owns the shape registry and all step scratch storage, and runs the
/// detection pipeline over a fixed-size worker pool.
pub struct CollisionSystem {
    data: CollisionData,
    broadphase: Broadphase,
    settings: CollisionSettings,
    pool: rayon::ThreadPool,
    thread_count: usize,
    active_region: Option<Aabb>,
    timer_broad: Stopwatch,
    timer_narrow: Stopwatch,
}

impl CollisionSystem {
    /// Create a collision system with default settings and a worker pool
    /// sized to the machine
    pub fn new() -> Result<Self, CollisionError> {
        Self::with_settings(CollisionSettings::default())
    }

    /// Create a collision system with explicit settings
    pub fn with_settings(settings: CollisionSettings) -> Result<Self, CollisionError> {
        let pool = rayon::ThreadPoolBuilder::new().build()?;
        let thread_count = pool.current_num_threads();
        Ok(Self {
            data: CollisionData::new(),
            broadphase: Broadphase::new(),
            settings,
            pool,
            thread_count,
            active_region: None,
            timer_broad: Stopwatch::new(),
            timer_narrow: Stopwatch::new(),
        })
    }

    /// Register a collision shape on a body, in the default family
    ///
    /// O(1) amortized. The registry is append-only; see
    /// [`CollisionSystem::remove`].
    pub fn add(
        &mut self,
        body: BodyId,
        shape: CollisionShape,
        offset: Pose,
    ) -> Result<ShapeId, CollisionError> {
        self.add_with_family(body, shape, offset, CollisionFamilies::DEFAULT, CollisionFamilies::ALL)
    }

    /// Register a collision shape with an explicit family and family mask
    pub fn add_with_family(
        &mut self,
        body: BodyId,
        shape: CollisionShape,
        offset: Pose,
        family: u32,
        family_mask: u32,
    ) -> Result<ShapeId, CollisionError> {
        self.data.register(body, shape, offset, family, family_mask)
    }

    /// Remove a collision shape
    ///
    /// Not supported in this design: always fails with
    /// [`CollisionError::RemovalUnsupported`] and changes nothing. Callers
    /// must treat collision shapes as append-only for the lifetime of the
    /// system.
    pub fn remove(&mut self, shape: ShapeId) -> Result<(), CollisionError> {
        self.data.unregister(shape)
    }

    /// Resize the shared-memory worker pool used by all parallel phases
    ///
    /// Fails with a configuration error when `threads` is zero.
    pub fn set_thread_count(&mut self, threads: usize) -> Result<(), CollisionError> {
        if threads == 0 {
            return Err(CollisionError::InvalidThreadCount(threads));
        }
        self.pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        self.thread_count = threads;
        Ok(())
    }

    /// Current worker pool size
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Update a body's world pose for the coming step
    pub fn set_body_pose(&mut self, body: BodyId, position: Vec3, rotation: Quat) {
        self.data.set_body_pose(body, position, rotation);
    }

    /// Update a body's active flag
    pub fn set_body_active(&mut self, body: BodyId, active: bool) {
        self.data.set_body_active(body, active);
    }

    /// Run one collision detection step
    ///
    /// Executes AABB generation, broadphase and narrowphase in order;
    /// records broad- and narrow-phase wall time in the resettable phase
    /// timers. Contact storage is overwritten, so the previous step's
    /// contacts must have been drained with
    /// [`CollisionSystem::report_contacts`] before this call.
    pub fn run(&mut self) {
        self.data.clear_step_scratch();

        self.timer_broad.start();
        {
            let data = &mut self.data;
            let broadphase = &mut self.broadphase;
            let settings = &self.settings;
            let region = self.active_region;
            self.pool.install(|| {
                aabb_generator::generate_world_aabbs(data, settings.envelope);
                aabb_generator::compute_body_aabbs(data);
                apply_activity(data, region.as_ref());
                broadphase.dispatch(data, settings);
            });
        }
        self.timer_broad.stop();

        self.timer_narrow.start();
        {
            let data = &mut self.data;
            let settings = &self.settings;
            self.pool.install(|| narrowphase::dispatch_all(data, settings));
        }
        self.timer_narrow.stop();

        log::debug!(
            "collision step: {} shapes, {} pairs, {} contacts",
            self.data.shape_count(),
            self.data.pairs.len(),
            self.data.contacts.len()
        );
    }

    /// Push the current step's contact records into a consumer
    ///
    /// Must happen before the next [`CollisionSystem::run`], which
    /// overwrites the contact storage.
    pub fn report_contacts(&self, sink: &mut dyn ContactSink) {
        for contact in &self.data.contacts {
            sink.add_contact(contact);
        }
    }

    /// The current step's contact records
    pub fn contacts(&self) -> &[Contact] {
        &self.data.contacts
    }

    /// Read-only snapshot of the last broadphase candidate-pair output
    pub fn overlapping_pairs(&self) -> &[(ShapeId, ShapeId)] {
        &self.data.pairs
    }

    /// Union AABB over all active shapes, as of the last step
    ///
    /// An empty scene (or a system that has not run yet) returns the
    /// degenerate box with both corners at the origin.
    pub fn bounding_box(&self) -> Aabb {
        let mut out = Aabb::inverted();
        let mut any = false;
        for (i, aabb) in self.data.aabbs.iter().enumerate() {
            if self.data.shape_active[i] && aabb.is_valid() {
                out.merge(aabb);
                any = true;
            }
        }
        if any {
            out
        } else {
            Aabb::new(Vec3::zeros(), Vec3::zeros())
        }
    }

    /// Enable the active region
    ///
    /// From the next step on, bodies whose AABB lies entirely outside the
    /// region are deactivated and excluded from broadphase and narrowphase
    /// work. Registration is never affected; disabling the region restores
    /// full participation.
    pub fn set_active_region(&mut self, min: Vec3, max: Vec3) {
        self.active_region = Some(Aabb::new(min, max));
    }

    /// Disable the active region
    pub fn clear_active_region(&mut self) {
        self.active_region = None;
    }

    /// The active region, if enabled
    pub fn active_region(&self) -> Option<Aabb> {
        self.active_region
    }

    /// Mark which bodies' AABBs lie fully inside a query box
    ///
    /// Returns one flag per body id, based on the AABBs of the last step.
    /// Independent of the active-region feature.
    pub fn overlapping_bodies_in(&self, region: &Aabb) -> Vec<bool> {
        self.data
            .body_aabbs
            .iter()
            .map(|aabb| aabb.is_valid() && region.contains(aabb))
            .collect()
    }

    /// Perform a ray-hit test against all collision shapes
    ///
    /// Not implemented in this design: always reports no hit. Callers
    /// needing ray queries must use an external structure.
    pub fn ray_hit(&self, _from: Vec3, _to: Vec3) -> Option<RayHit> {
        None
    }

    /// Wall time spent in the broad phase (including AABB generation)
    /// since the last reset
    pub fn broadphase_time(&self) -> Duration {
        self.timer_broad.elapsed()
    }

    /// Wall time spent in the narrow phase since the last reset
    pub fn narrowphase_time(&self) -> Duration {
        self.timer_narrow.elapsed()
    }

    /// Reset the phase timers to zero
    pub fn reset_timers(&mut self) {
        self.timer_broad.reset();
        self.timer_narrow.reset();
    }

    /// Drop the per-step outputs (pairs, contacts), keeping the registry
    pub fn clear(&mut self) {
        self.data.clear_step_scratch();
    }

    /// The collision data registry
    pub fn data(&self) -> &CollisionData {
        &self.data
    }

    /// Detection settings in effect
    pub fn settings(&self) -> &CollisionSettings {
        &self.settings
    }
}

/// Resolve each body's effective activity for this step and fan it out to
/// the per-shape flags
///
/// A body participates when its user flag is set and, with an active
/// region enabled, when its AABB touches the region.
fn apply_activity(data: &mut CollisionData, region: Option<&Aabb>) {
    let body_count = data.body_pose.len();
    data.body_step_active.clear();
    for b in 0..body_count {
        let user = data.body_active[b];
        let in_region = region.map_or(true, |r| data.body_aabbs[b].intersects(r));
        data.body_step_active.push(user && in_region);
    }
    let CollisionData {
        shape_body,
        shape_active,
        body_step_active,
        ..
    } = data;
    for (i, flag) in shape_active.iter_mut().enumerate() {
        *flag = body_step_active[shape_body[i].index()];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn sphere_scene(positions: &[Vec3], radius: f32) -> CollisionSystem {
        let mut system = CollisionSystem::new().unwrap();
        for (i, &p) in positions.iter().enumerate() {
            let body = BodyId::new(i as u32);
            system
                .add(body, CollisionShape::sphere(radius), Pose::identity())
                .unwrap();
            system.set_body_pose(body, p, Quat::identity());
        }
        system
    }

    fn pair_set(system: &CollisionSystem) -> HashSet<(u32, u32)> {
        system
            .overlapping_pairs()
            .iter()
            .map(|&(a, b)| (a.index() as u32, b.index() as u32))
            .collect()
    }

    #[test]
    fn test_touching_unit_spheres_end_to_end() {
        let mut system = sphere_scene(&[Vec3::zeros(), Vec3::new(2.0, 0.0, 0.0)], 1.0);
        system.run();

        let contacts = system.contacts();
        assert_eq!(contacts.len(), 1);
        let c = &contacts[0];
        assert_relative_eq!(c.point, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(c.normal, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(c.depth, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_overlapping_unit_spheres_end_to_end() {
        let mut system = sphere_scene(&[Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0)], 1.0);
        system.run();

        let contacts = system.contacts();
        assert_eq!(contacts.len(), 1);
        assert_relative_eq!(contacts[0].depth, 1.0, epsilon = 1e-5);
        assert_relative_eq!(contacts[0].normal, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_empty_scene_is_not_an_error() {
        let mut system = CollisionSystem::new().unwrap();
        system.run();
        assert!(system.overlapping_pairs().is_empty());
        assert!(system.contacts().is_empty());
        let bb = system.bounding_box();
        assert_eq!(bb.min, Vec3::zeros());
        assert_eq!(bb.max, Vec3::zeros());
    }

    #[test]
    fn test_pair_set_invariant_across_thread_counts() {
        let mut rng_state = 0x9E37_79B9_u32;
        let mut next = move || {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 17;
            rng_state ^= rng_state << 5;
            (rng_state >> 8) as f32 / (1u32 << 24) as f32
        };
        let positions: Vec<Vec3> = (0..200)
            .map(|_| {
                Vec3::new(
                    next() * 30.0 - 15.0,
                    next() * 30.0 - 15.0,
                    next() * 30.0 - 15.0,
                )
            })
            .collect();

        let mut system = sphere_scene(&positions, 1.0);
        let mut reference = None;
        for threads in [1usize, 2, 8] {
            system.set_thread_count(threads).unwrap();
            system.run();
            let pairs = pair_set(&system);
            match &reference {
                None => reference = Some(pairs),
                Some(expected) => {
                    assert_eq!(&pairs, expected, "pair set changed with {threads} threads");
                }
            }
        }
        assert!(!reference.unwrap().is_empty());
    }

    #[test]
    fn test_invalid_thread_count_rejected() {
        let mut system = CollisionSystem::new().unwrap();
        assert!(matches!(
            system.set_thread_count(0),
            Err(CollisionError::InvalidThreadCount(0))
        ));
        // The previous pool stays usable.
        system.run();
    }

    #[test]
    fn test_remove_is_a_documented_gap() {
        let mut system = sphere_scene(&[Vec3::zeros()], 1.0);
        let id = ShapeId(0);
        assert!(matches!(
            system.remove(id),
            Err(CollisionError::RemovalUnsupported)
        ));
        assert_eq!(system.data().shape_count(), 1);
    }

    #[test]
    fn test_ray_hit_always_misses() {
        let mut system = sphere_scene(&[Vec3::zeros()], 1.0);
        system.run();
        // The ray passes straight through the sphere, but ray queries are
        // a documented capability gap.
        assert!(system
            .ray_hit(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0))
            .is_none());
    }

    #[test]
    fn test_active_region_excludes_bodies() {
        let mut system = sphere_scene(&[Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0)], 1.0);
        system.run();
        assert_eq!(system.contacts().len(), 1);

        // A far-away active region deactivates every body.
        system.set_active_region(Vec3::new(100.0, 100.0, 100.0), Vec3::new(200.0, 200.0, 200.0));
        system.run();
        assert!(system.overlapping_pairs().is_empty());
        assert!(system.contacts().is_empty());
        // Registration is untouched.
        assert_eq!(system.data().shape_count(), 2);

        // Disabling the region restores detection.
        system.clear_active_region();
        system.run();
        assert_eq!(system.contacts().len(), 1);
    }

    #[test]
    fn test_inactive_body_still_hit_by_active_one() {
        let mut system = sphere_scene(&[Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0)], 1.0);
        system.set_body_active(BodyId::new(1), false);
        system.run();
        assert_eq!(system.contacts().len(), 1, "one active body keeps the contact");

        system.set_body_active(BodyId::new(0), false);
        system.run();
        assert!(system.contacts().is_empty(), "both inactive drops it");
    }

    #[test]
    fn test_bounding_box_unions_active_shapes() {
        let mut system = sphere_scene(&[Vec3::zeros(), Vec3::new(5.0, 0.0, 0.0)], 1.0);
        system.run();
        let bb = system.bounding_box();
        assert!(bb.min.x < -0.9 && bb.max.x > 5.9);

        // Deactivating a body shrinks the box on the next step.
        system.set_body_active(BodyId::new(1), false);
        system.run();
        let bb = system.bounding_box();
        assert!(bb.max.x < 2.0);
    }

    #[test]
    fn test_overlapping_bodies_in_query_box() {
        let mut system = sphere_scene(&[Vec3::zeros(), Vec3::new(10.0, 0.0, 0.0)], 1.0);
        system.run();

        let region = Aabb::new(Vec3::new(-3.0, -3.0, -3.0), Vec3::new(3.0, 3.0, 3.0));
        let flags = system.overlapping_bodies_in(&region);
        assert_eq!(flags, vec![true, false]);
        // The query must not touch the active-region feature.
        assert!(system.active_region().is_none());
    }

    #[test]
    fn test_report_contacts_drains_into_sink() {
        let mut system = sphere_scene(&[Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0)], 1.0);
        system.run();

        let mut sink: Vec<Contact> = Vec::new();
        system.report_contacts(&mut sink);
        assert_eq!(sink.len(), system.contacts().len());
        assert_eq!(sink[0], system.contacts()[0]);
    }

    #[test]
    fn test_timers_accumulate_and_reset() {
        let mut system = sphere_scene(&[Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0)], 1.0);
        system.run();
        system.reset_timers();
        assert_eq!(system.broadphase_time(), Duration::ZERO);
        assert_eq!(system.narrowphase_time(), Duration::ZERO);
    }

    #[test]
    fn test_mixed_shape_scene_end_to_end() {
        let mut system = CollisionSystem::new().unwrap();
        // Floor cuboid with a sphere, a capsule and a cylinder resting in it.
        system
            .add(
                BodyId::new(0),
                CollisionShape::cuboid(Vec3::new(10.0, 1.0, 10.0)),
                Pose::identity(),
            )
            .unwrap();
        system
            .add(BodyId::new(1), CollisionShape::sphere(0.5), Pose::identity())
            .unwrap();
        system
            .add(BodyId::new(2), CollisionShape::capsule(0.3, 0.5), Pose::identity())
            .unwrap();
        system
            .add(BodyId::new(3), CollisionShape::cylinder(0.4, 0.5), Pose::identity())
            .unwrap();
        system.set_body_pose(BodyId::new(1), Vec3::new(-3.0, 1.4, 0.0), Quat::identity());
        system.set_body_pose(BodyId::new(2), Vec3::new(0.0, 1.7, 0.0), Quat::identity());
        system.set_body_pose(BodyId::new(3), Vec3::new(3.0, 1.4, 0.0), Quat::identity());

        system.run();

        // Every shape touches the floor and nothing else.
        assert_eq!(system.overlapping_pairs().len(), 3);
        let touched: HashSet<u32> = system
            .contacts()
            .iter()
            .flat_map(|c| [c.shape_a.index() as u32, c.shape_b.index() as u32])
            .collect();
        assert!(touched.contains(&0));
        assert_eq!(touched.len(), 4);
        for c in system.contacts() {
            assert!(c.depth >= -system.settings().separation_tolerance);
        }
    }
}
