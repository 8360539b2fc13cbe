//! Collision shape descriptors (stored in MODEL SPACE)
//!
//! Shapes store their dimensions in a local frame and are transformed to
//! world space on-the-fly during AABB generation and narrow-phase tests.
//! Capsules and cylinders are aligned with their local Y axis.

use crate::error::CollisionError;
use crate::foundation::math::{Pose, Vec3};
use crate::shapes::Aabb;

/// Small safety margin added to analytic AABBs to absorb rounding
const AABB_EPSILON: f32 = 1e-5;

/// Collision shape types
#[derive(Debug, Clone)]
pub enum CollisionShape {
    /// A sphere with the given radius, centered at the shape origin
    Sphere {
        /// Sphere radius
        radius: f32,
    },
    /// A box with the given half-extents along the local axes
    Cuboid {
        /// Half-extent along each local axis
        half_extents: Vec3,
    },
    /// A capsule along the local Y axis: a segment of half-length
    /// `half_length` swept by a sphere of `radius`
    Capsule {
        /// Radius of the swept sphere
        radius: f32,
        /// Half-length of the core segment
        half_length: f32,
    },
    /// A cylinder along the local Y axis
    Cylinder {
        /// Cylinder radius
        radius: f32,
        /// Half-height along the local Y axis
        half_length: f32,
    },
    /// A convex hull described by its vertex cloud (model space)
    ConvexHull {
        /// Hull vertices; at least 4 points
        points: Vec<Vec3>,
    },
    /// A triangle mesh described by vertices and index triples (model space)
    TriangleMesh {
        /// Mesh vertices
        vertices: Vec<Vec3>,
        /// Vertex index triples, one per triangle
        triangles: Vec<[u32; 3]>,
    },
}

impl CollisionShape {
    /// Create a spherical collision shape with the given radius
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    /// Create a box collision shape with the given half-extents
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::Cuboid { half_extents }
    }

    /// Create a capsule along the local Y axis
    pub fn capsule(radius: f32, half_length: f32) -> Self {
        Self::Capsule { radius, half_length }
    }

    /// Create a cylinder along the local Y axis
    pub fn cylinder(radius: f32, half_length: f32) -> Self {
        Self::Cylinder { radius, half_length }
    }

    /// Create a convex hull from a model-space vertex cloud
    pub fn convex_hull(points: Vec<Vec3>) -> Self {
        Self::ConvexHull { points }
    }

    /// Create a triangle mesh from model-space vertices and index triples
    pub fn triangle_mesh(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self::TriangleMesh { vertices, triangles }
    }

    /// Short human-readable name of the shape kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sphere { .. } => "sphere",
            Self::Cuboid { .. } => "cuboid",
            Self::Capsule { .. } => "capsule",
            Self::Cylinder { .. } => "cylinder",
            Self::ConvexHull { .. } => "convex hull",
            Self::TriangleMesh { .. } => "triangle mesh",
        }
    }

    /// Validate the shape's dimensions
    ///
    /// Registration rejects malformed geometry up front so the per-step
    /// pipeline never has to handle it.
    pub fn validate(&self) -> Result<(), CollisionError> {
        let malformed = |msg: String| Err(CollisionError::MalformedShape(msg));
        match self {
            Self::Sphere { radius } => {
                if !radius.is_finite() || *radius <= 0.0 {
                    return malformed(format!("sphere radius must be finite and positive, got {radius}"));
                }
            }
            Self::Cuboid { half_extents } => {
                if !(half_extents.x.is_finite() && half_extents.y.is_finite() && half_extents.z.is_finite())
                    || half_extents.min() <= 0.0
                {
                    return malformed(format!("cuboid half-extents must be finite and positive, got {half_extents:?}"));
                }
            }
            Self::Capsule { radius, half_length } | Self::Cylinder { radius, half_length } => {
                if !radius.is_finite() || *radius <= 0.0 {
                    return malformed(format!("{} radius must be finite and positive, got {radius}", self.name()));
                }
                if !half_length.is_finite() || *half_length <= 0.0 {
                    return malformed(format!("{} half-length must be finite and positive, got {half_length}", self.name()));
                }
            }
            Self::ConvexHull { points } => {
                if points.len() < 4 {
                    return malformed(format!("convex hull needs at least 4 points, got {}", points.len()));
                }
                if points.iter().any(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite())) {
                    return malformed("convex hull contains a non-finite point".to_string());
                }
            }
            Self::TriangleMesh { vertices, triangles } => {
                if vertices.is_empty() || triangles.is_empty() {
                    return malformed("triangle mesh must have at least one vertex and one triangle".to_string());
                }
                if vertices.iter().any(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite())) {
                    return malformed("triangle mesh contains a non-finite vertex".to_string());
                }
                let n = vertices.len() as u32;
                if triangles.iter().flatten().any(|&i| i >= n) {
                    return malformed("triangle mesh index out of range".to_string());
                }
            }
        }
        Ok(())
    }

    /// Compute the world-space AABB of this shape at the given pose
    ///
    /// Analytic (exact) for the primitive shapes, vertex sweep for hulls
    /// and meshes. A fixed numerical epsilon is always added; the caller
    /// applies the configurable collision envelope on top.
    pub fn world_aabb(&self, pose: &Pose) -> Aabb {
        let aabb = match self {
            Self::Sphere { radius } => {
                Aabb::from_center_extents(pose.position, Vec3::repeat(*radius))
            }
            Self::Cuboid { half_extents } => {
                let extents = pose.rotation_matrix().abs() * half_extents;
                Aabb::from_center_extents(pose.position, extents)
            }
            Self::Capsule { radius, half_length } => {
                // Segment AABB extended by the radius on every axis.
                let axis = pose.transform_vector(Vec3::y());
                let extents = Vec3::new(
                    half_length * axis.x.abs() + radius,
                    half_length * axis.y.abs() + radius,
                    half_length * axis.z.abs() + radius,
                );
                Aabb::from_center_extents(pose.position, extents)
            }
            Self::Cylinder { radius, half_length } => {
                // Exact extent of an oriented disc pair: hl*|u_i| + r*sqrt(1 - u_i^2).
                let axis = pose.transform_vector(Vec3::y());
                let disc = |u: f32| radius * (1.0 - u * u).max(0.0).sqrt();
                let extents = Vec3::new(
                    half_length * axis.x.abs() + disc(axis.x),
                    half_length * axis.y.abs() + disc(axis.y),
                    half_length * axis.z.abs() + disc(axis.z),
                );
                Aabb::from_center_extents(pose.position, extents)
            }
            Self::ConvexHull { points } => {
                Aabb::from_points(points.iter().map(|p| pose.transform_point(*p)))
            }
            Self::TriangleMesh { vertices, .. } => {
                Aabb::from_points(vertices.iter().map(|p| pose.transform_point(*p)))
            }
        };
        aabb.inflated(AABB_EPSILON)
    }

    /// World-space support point: the point of the shape farthest along
    /// `direction`
    ///
    /// This is the support mapping used by the iterative narrow-phase
    /// routines. Triangle meshes are supported over their vertex cloud,
    /// i.e. treated as the convex hull of their vertices.
    pub fn support(&self, pose: &Pose, direction: Vec3) -> Vec3 {
        let local_dir = pose.inverse_transform_vector(direction);
        pose.transform_point(self.local_support(local_dir))
    }

    /// Radius of curvature at a contact, when the shape has one
    ///
    /// Spheres, capsules and cylinders have a well-defined surface radius;
    /// flat-faced shapes report `None` and the solver-facing default from
    /// the settings is used instead.
    pub fn curvature_radius(&self) -> Option<f32> {
        match self {
            Self::Sphere { radius }
            | Self::Capsule { radius, .. }
            | Self::Cylinder { radius, .. } => Some(*radius),
            _ => None,
        }
    }

    /// Support point in the shape's local frame
    fn local_support(&self, dir: Vec3) -> Vec3 {
        match self {
            Self::Sphere { radius } => normalize_or(dir, Vec3::x()) * *radius,
            Self::Cuboid { half_extents } => Vec3::new(
                if dir.x >= 0.0 { half_extents.x } else { -half_extents.x },
                if dir.y >= 0.0 { half_extents.y } else { -half_extents.y },
                if dir.z >= 0.0 { half_extents.z } else { -half_extents.z },
            ),
            Self::Capsule { radius, half_length } => {
                let cap = if dir.y >= 0.0 { *half_length } else { -half_length };
                Vec3::new(0.0, cap, 0.0) + normalize_or(dir, Vec3::x()) * *radius
            }
            Self::Cylinder { radius, half_length } => {
                let cap = if dir.y >= 0.0 { *half_length } else { -half_length };
                let radial = Vec3::new(dir.x, 0.0, dir.z);
                let len = radial.norm();
                let rim = if len > 1e-10 { radial * (radius / len) } else { Vec3::zeros() };
                Vec3::new(rim.x, cap, rim.z)
            }
            Self::ConvexHull { points } => farthest_point(points, dir),
            Self::TriangleMesh { vertices, .. } => farthest_point(vertices, dir),
        }
    }
}

/// Normalize `v`, falling back to `fallback` for near-zero input
fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    let len = v.norm();
    if len > 1e-10 {
        v / len
    } else {
        fallback
    }
}

/// The point of a cloud farthest along `dir`
fn farthest_point(points: &[Vec3], dir: Vec3) -> Vec3 {
    let mut best = points[0];
    let mut best_dot = best.dot(&dir);
    for p in &points[1..] {
        let d = p.dot(&dir);
        if d > best_dot {
            best_dot = d;
            best = *p;
        }
    }
    best
}
