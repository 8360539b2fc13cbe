//! # Collision Engine
//!
//! A multithreaded rigid-body collision detection engine.
//!
//! ## Features
//!
//! - **Two-Phase Detection**: uniform-grid broadphase plus exact
//!   narrowphase contact generation
//! - **Parallel Pipeline**: every phase is a parallel loop over a
//!   configurable worker pool
//! - **Six Shape Types**: spheres, cuboids, capsules, cylinders, convex
//!   hulls and triangle meshes
//! - **Deterministic Pair Sets**: identical candidate pairs regardless of
//!   worker thread count
//! - **Active Region Culling**: spatial filter that excludes far-away
//!   bodies from detection work
//!
//! ## Quick Start
//!
//! ```rust
//! use collision_engine::prelude::*;
//!
//! fn main() -> Result<(), CollisionError> {
//!     let mut system = CollisionSystem::new()?;
//!
//!     let ball = BodyId::new(0);
//!     let ground = BodyId::new(1);
//!     system.add(ball, CollisionShape::sphere(0.5), Pose::identity())?;
//!     system.add(ground, CollisionShape::cuboid(Vec3::new(10.0, 1.0, 10.0)), Pose::identity())?;
//!
//!     // Each step: feed poses in, run, drain contacts.
//!     system.set_body_pose(ball, Vec3::new(0.0, 1.4, 0.0), Quat::identity());
//!     system.run();
//!
//!     let mut contacts: Vec<Contact> = Vec::new();
//!     system.report_contacts(&mut contacts);
//!     assert_eq!(contacts.len(), 1);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;

pub mod contact;
pub mod data;
pub mod error;
pub mod families;
pub mod settings;
pub mod shapes;
pub mod system;

mod aabb_generator;
mod broadphase;
mod narrowphase;

pub use contact::{Contact, ContactSink};
pub use data::{BodyId, CollisionData, ShapeId};
pub use error::CollisionError;
pub use families::CollisionFamilies;
pub use settings::CollisionSettings;
pub use shapes::{Aabb, CollisionShape};
pub use system::{CollisionSystem, RayHit};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        contact::{Contact, ContactSink},
        data::{BodyId, ShapeId},
        error::CollisionError,
        families::CollisionFamilies,
        foundation::math::{Pose, Quat, Vec3},
        settings::CollisionSettings,
        shapes::{Aabb, CollisionShape},
        system::{CollisionSystem, RayHit},
    };
}
