//! GJK intersection test and EPA penetration extraction
//!
//! The general convex-convex path: any shape pair without a closed-form
//! routine lands here. GJK decides whether the shapes overlap; on overlap
//! EPA expands the terminal simplex into a polytope and reads off the
//! deepest-penetration contact. Support points on both shapes are carried
//! through so the contact witness points are exact rather than
//! approximated from the Minkowski difference.

use crate::foundation::math::{Pose, Vec3};
use crate::narrowphase::GeomContact;
use crate::shapes::CollisionShape;

const GJK_MAX_ITERATIONS: usize = 64;
const EPA_MAX_ITERATIONS: usize = 64;
const EPA_TOLERANCE: f32 = 1e-4;

/// One vertex of the Minkowski difference, with the originating support
/// points on both shapes
#[derive(Debug, Clone, Copy)]
struct SupportPoint {
    m: Vec3,
    on_a: Vec3,
    on_b: Vec3,
}

fn support(
    shape_a: &CollisionShape,
    pose_a: &Pose,
    shape_b: &CollisionShape,
    pose_b: &Pose,
    direction: Vec3,
) -> SupportPoint {
    let on_a = shape_a.support(pose_a, direction);
    let on_b = shape_b.support(pose_b, -direction);
    SupportPoint {
        m: on_a - on_b,
        on_a,
        on_b,
    }
}

/// Compute the deepest-penetration contact between two convex shapes
///
/// Returns `None` when the shapes do not overlap. The contact normal
/// points from shape A toward shape B.
pub(crate) fn contact(
    shape_a: &CollisionShape,
    pose_a: &Pose,
    shape_b: &CollisionShape,
    pose_b: &Pose,
) -> Option<GeomContact> {
    let simplex = intersect(shape_a, pose_a, shape_b, pose_b)?;
    let simplex = complete_simplex(simplex, shape_a, pose_a, shape_b, pose_b)?;
    penetration(simplex, shape_a, pose_a, shape_b, pose_b)
}

/// GJK boolean test; returns the terminal simplex when the shapes overlap
fn intersect(
    shape_a: &CollisionShape,
    pose_a: &Pose,
    shape_b: &CollisionShape,
    pose_b: &Pose,
) -> Option<Vec<SupportPoint>> {
    let mut direction = pose_b.position - pose_a.position;
    if direction.norm_squared() < 1e-10 {
        direction = Vec3::x();
    }

    let mut simplex = Vec::with_capacity(4);
    let first = support(shape_a, pose_a, shape_b, pose_b, direction);
    simplex.push(first);
    direction = -first.m;

    if direction.norm_squared() < 1e-10 {
        // The first support point is the origin itself.
        return Some(simplex);
    }

    for _ in 0..GJK_MAX_ITERATIONS {
        let new_point = support(shape_a, pose_a, shape_b, pose_b, direction);
        if new_point.m.dot(&direction) < 0.0 {
            return None; // separating direction found
        }
        simplex.push(new_point);

        if next_simplex(&mut simplex, &mut direction) {
            return Some(simplex);
        }
        if direction.norm_squared() < 1e-10 {
            // Origin lies on a simplex feature; treat as touching.
            return Some(simplex);
        }
    }
    None
}

/// Triple cross product: (a x b) x c
fn triple_cross(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    a.cross(&b).cross(&c)
}

/// Reduce the simplex and choose the next search direction.
/// Returns true if the origin is enclosed.
fn next_simplex(simplex: &mut Vec<SupportPoint>, direction: &mut Vec3) -> bool {
    match simplex.len() {
        2 => line_case(simplex, direction),
        3 => triangle_case(simplex, direction),
        4 => tetrahedron_case(simplex, direction),
        _ => false,
    }
}

fn line_case(simplex: &mut Vec<SupportPoint>, direction: &mut Vec3) -> bool {
    let a = simplex[1]; // most recently added
    let b = simplex[0];
    let ab = b.m - a.m;
    let ao = -a.m;

    if ab.dot(&ao) > 0.0 {
        *direction = triple_cross(ab, ao, ab);
    } else {
        *simplex = vec![a];
        *direction = ao;
    }
    false
}

fn triangle_case(simplex: &mut Vec<SupportPoint>, direction: &mut Vec3) -> bool {
    let a = simplex[2]; // most recently added
    let b = simplex[1];
    let c = simplex[0];
    let ab = b.m - a.m;
    let ac = c.m - a.m;
    let ao = -a.m;
    let abc = ab.cross(&ac);

    if abc.cross(&ac).dot(&ao) > 0.0 {
        if ac.dot(&ao) > 0.0 {
            *simplex = vec![c, a];
            *direction = triple_cross(ac, ao, ac);
        } else {
            *simplex = vec![b, a];
            return line_case(simplex, direction);
        }
    } else if ab.cross(&abc).dot(&ao) > 0.0 {
        *simplex = vec![b, a];
        return line_case(simplex, direction);
    } else if abc.dot(&ao) > 0.0 {
        *direction = abc;
    } else {
        *simplex = vec![b, c, a];
        *direction = -abc;
    }
    false
}

fn tetrahedron_case(simplex: &mut Vec<SupportPoint>, direction: &mut Vec3) -> bool {
    let a = simplex[3]; // most recently added
    let b = simplex[2];
    let c = simplex[1];
    let d = simplex[0];
    let ab = b.m - a.m;
    let ac = c.m - a.m;
    let ad = d.m - a.m;
    let ao = -a.m;

    let abc = ab.cross(&ac);
    let acd = ac.cross(&ad);
    let adb = ad.cross(&ab);

    if abc.dot(&ao) > 0.0 {
        *simplex = vec![c, b, a];
        *direction = abc;
        return triangle_case(simplex, direction);
    }
    if acd.dot(&ao) > 0.0 {
        *simplex = vec![d, c, a];
        *direction = acd;
        return triangle_case(simplex, direction);
    }
    if adb.dot(&ao) > 0.0 {
        *simplex = vec![b, d, a];
        *direction = adb;
        return triangle_case(simplex, direction);
    }

    true // origin inside the tetrahedron
}

/// Expand a degenerate terminal simplex to a full tetrahedron
///
/// EPA needs four affinely independent vertices. Grazing configurations
/// that cannot be expanded have essentially zero depth and are skipped.
fn complete_simplex(
    mut simplex: Vec<SupportPoint>,
    shape_a: &CollisionShape,
    pose_a: &Pose,
    shape_b: &CollisionShape,
    pose_b: &Pose,
) -> Option<Vec<SupportPoint>> {
    let probes = [
        Vec3::x(),
        -Vec3::x(),
        Vec3::y(),
        -Vec3::y(),
        Vec3::z(),
        -Vec3::z(),
    ];

    while simplex.len() < 2 {
        let mut extended = false;
        for dir in probes {
            let s = support(shape_a, pose_a, shape_b, pose_b, dir);
            if (s.m - simplex[0].m).norm_squared() > 1e-8 {
                simplex.push(s);
                extended = true;
                break;
            }
        }
        if !extended {
            return None;
        }
    }

    if simplex.len() < 3 {
        let axis = simplex[1].m - simplex[0].m;
        for dir in probes {
            let candidate = axis.cross(&dir);
            if candidate.norm_squared() < 1e-8 {
                continue;
            }
            let s = support(shape_a, pose_a, shape_b, pose_b, candidate);
            if triangle_area_sq(simplex[0].m, simplex[1].m, s.m) > 1e-10 {
                simplex.push(s);
                break;
            }
            let s = support(shape_a, pose_a, shape_b, pose_b, -candidate);
            if triangle_area_sq(simplex[0].m, simplex[1].m, s.m) > 1e-10 {
                simplex.push(s);
                break;
            }
        }
        if simplex.len() < 3 {
            return None;
        }
    }

    if simplex.len() < 4 {
        let normal =
            (simplex[1].m - simplex[0].m).cross(&(simplex[2].m - simplex[0].m));
        if normal.norm_squared() < 1e-12 {
            return None;
        }
        let s = support(shape_a, pose_a, shape_b, pose_b, normal);
        if tetra_volume(simplex[0].m, simplex[1].m, simplex[2].m, s.m).abs() > 1e-10 {
            simplex.push(s);
        } else {
            let s = support(shape_a, pose_a, shape_b, pose_b, -normal);
            if tetra_volume(simplex[0].m, simplex[1].m, simplex[2].m, s.m).abs() > 1e-10 {
                simplex.push(s);
            } else {
                return None;
            }
        }
    }

    Some(simplex)
}

fn triangle_area_sq(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (b - a).cross(&(c - a)).norm_squared()
}

fn tetra_volume(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> f32 {
    (b - a).cross(&(c - a)).dot(&(d - a))
}

/// EPA: expand the polytope until the closest face to the origin stops
/// moving, then derive the contact from that face
fn penetration(
    simplex: Vec<SupportPoint>,
    shape_a: &CollisionShape,
    pose_a: &Pose,
    shape_b: &CollisionShape,
    pose_b: &Pose,
) -> Option<GeomContact> {
    let mut polytope = simplex;
    let mut faces: Vec<[usize; 3]> = vec![[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]];

    for _ in 0..EPA_MAX_ITERATIONS {
        // Find the face closest to the origin.
        let mut min_dist = f32::MAX;
        let mut min_face = usize::MAX;
        let mut min_normal = Vec3::zeros();

        for (i, face) in faces.iter().enumerate() {
            let a = polytope[face[0]].m;
            let b = polytope[face[1]].m;
            let c = polytope[face[2]].m;
            let normal = (b - a).cross(&(c - a));
            let len = normal.norm();
            if len < 1e-10 {
                continue;
            }
            let normal = normal / len;
            let dist = normal.dot(&a);
            // Orient the normal away from the origin.
            let (normal, dist) = if dist < 0.0 { (-normal, -dist) } else { (normal, dist) };

            if dist < min_dist {
                min_dist = dist;
                min_face = i;
                min_normal = normal;
            }
        }

        if min_face == usize::MAX {
            return None;
        }

        let new_point = support(shape_a, pose_a, shape_b, pose_b, min_normal);
        let new_dist = new_point.m.dot(&min_normal);

        if new_dist - min_dist < EPA_TOLERANCE {
            // Converged: the closest face carries the contact.
            let face = faces[min_face];
            let (pa, pb, pc) = (polytope[face[0]], polytope[face[1]], polytope[face[2]]);
            let projected = min_normal * min_dist;
            let (u, v, w) = barycentric(projected, pa.m, pb.m, pc.m);
            let witness_a = pa.on_a * u + pb.on_a * v + pc.on_a * w;
            let witness_b = pa.on_b * u + pb.on_b * v + pc.on_b * w;
            return Some(GeomContact {
                point: (witness_a + witness_b) * 0.5,
                normal: min_normal,
                depth: min_dist,
            });
        }

        // Expand: remove every face visible from the new point, keeping
        // the silhouette edges, then fan new faces from the new point.
        let new_idx = polytope.len();
        polytope.push(new_point);

        let mut edges: Vec<[usize; 2]> = Vec::new();
        let mut i = 0;
        while i < faces.len() {
            let face = faces[i];
            let a = polytope[face[0]].m;
            let b = polytope[face[1]].m;
            let c = polytope[face[2]].m;
            let normal = (b - a).cross(&(c - a));
            let len = normal.norm();
            if len < 1e-10 {
                faces.swap_remove(i);
                continue;
            }
            let normal = normal / len;
            let normal = if normal.dot(&a) < 0.0 { -normal } else { normal };

            if normal.dot(&(new_point.m - a)) > 0.0 {
                add_edge(&mut edges, face[0], face[1]);
                add_edge(&mut edges, face[1], face[2]);
                add_edge(&mut edges, face[2], face[0]);
                faces.swap_remove(i);
            } else {
                i += 1;
            }
        }

        for edge in &edges {
            faces.push([edge[0], edge[1], new_idx]);
        }
        if faces.is_empty() {
            return None;
        }
    }

    None
}

/// Add an edge to the silhouette list, cancelling shared (reverse) edges
fn add_edge(edges: &mut Vec<[usize; 2]>, a: usize, b: usize) {
    if let Some(pos) = edges.iter().position(|e| e[0] == b && e[1] == a) {
        edges.swap_remove(pos);
    } else {
        edges.push([a, b]);
    }
}

/// Barycentric coordinates of `p` with respect to triangle `(a, b, c)`
fn barycentric(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> (f32, f32, f32) {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.norm_squared();
    let d01 = v0.dot(&v1);
    let d11 = v1.norm_squared();
    let d20 = v2.dot(&v0);
    let d21 = v2.dot(&v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < 1e-12 {
        return (1.0, 0.0, 0.0);
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    (1.0 - v - w, v, w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use approx::assert_relative_eq;

    #[test]
    fn test_overlapping_cylinders_side_by_side() {
        let a = CollisionShape::cylinder(1.0, 1.0);
        let b = CollisionShape::cylinder(1.0, 1.0);
        let pose_a = Pose::identity();
        let pose_b = Pose::from_position(Vec3::new(1.5, 0.0, 0.0));

        let contact = contact(&a, &pose_a, &b, &pose_b).expect("cylinders overlap");
        assert_relative_eq!(contact.normal, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-2);
        assert_relative_eq!(contact.depth, 0.5, epsilon = 1e-2);
    }

    #[test]
    fn test_separated_cylinders_no_contact() {
        let a = CollisionShape::cylinder(1.0, 1.0);
        let b = CollisionShape::cylinder(1.0, 1.0);
        let pose_a = Pose::identity();
        let pose_b = Pose::from_position(Vec3::new(2.5, 0.0, 0.0));
        assert!(contact(&a, &pose_a, &b, &pose_b).is_none());
    }

    #[test]
    fn test_hull_vs_cuboid_overlap() {
        // Regular tetrahedron poking into a unit cube.
        let hull = CollisionShape::convex_hull(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ]);
        let cuboid = CollisionShape::cuboid(Vec3::new(0.5, 0.5, 0.5));
        let pose_hull = Pose::from_position(Vec3::new(0.2, 0.0, 0.0));
        let pose_cuboid = Pose::from_position(Vec3::new(0.0, 0.0, 0.0));

        let contact = contact(&hull, &pose_hull, &cuboid, &pose_cuboid).expect("overlap");
        assert!(contact.depth > 0.0);
        assert_relative_eq!(contact.normal.norm(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_capsule_vs_rotated_cuboid() {
        let capsule = CollisionShape::capsule(0.3, 1.0);
        let cuboid = CollisionShape::cuboid(Vec3::new(1.0, 1.0, 1.0));
        let pose_capsule = Pose::from_position(Vec3::new(0.0, 2.0, 0.0));
        let pose_cuboid = Pose::from_position_rotation(
            Vec3::zeros(),
            Quat::from_axis_angle(&Vec3::y_axis(), 0.4),
        );

        // Capsule tip reaches y = 0.7; cube top is at y = 1 (rotation about
        // y leaves the top face in place), so they overlap by 0.3.
        let contact = contact(&capsule, &pose_capsule, &cuboid, &pose_cuboid).expect("overlap");
        assert!(contact.depth > 0.2 && contact.depth < 0.4, "depth {}", contact.depth);
        // Normal points from the capsule (above) toward the cube (below).
        assert!(contact.normal.y < -0.9, "normal {:?}", contact.normal);
    }

    #[test]
    fn test_mesh_treated_as_vertex_hull() {
        let mesh = CollisionShape::triangle_mesh(
            vec![
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
        );
        let probe = CollisionShape::cuboid(Vec3::new(0.4, 0.4, 0.4));
        let pose_mesh = Pose::identity();
        let pose_other = Pose::from_position(Vec3::new(0.0, 0.9, 0.0));

        assert!(contact(&mesh, &pose_mesh, &probe, &pose_other).is_some());
    }
}
