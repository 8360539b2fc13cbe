//! Cuboid vs cuboid contact generation
//!
//! Separating Axis Theorem over the 15 candidate axes (6 face normals,
//! 9 edge-edge cross products). A face axis with minimum penetration leads
//! to reference-face clipping, producing up to 4 contact points so that a
//! flat-on-flat stack cannot rotate through a single-point contact. An
//! edge-edge axis produces one contact at the closest points of the two
//! support edges.

use crate::foundation::math::{Pose, Vec3};
use crate::narrowphase::GeomContact;

/// Face axes are preferred over edge axes within this margin, since face
/// clipping yields the more stable manifold.
const EDGE_AXIS_BIAS: f32 = 1e-4;

#[derive(Debug, Clone, Copy)]
enum BestAxis {
    FaceA(usize),
    FaceB(usize),
    Edge(usize, usize),
}

/// Radius of a box projected onto a unit axis
fn projected_radius(half: Vec3, axes: &[Vec3; 3], axis: &Vec3) -> f32 {
    half.x * axes[0].dot(axis).abs()
        + half.y * axes[1].dot(axis).abs()
        + half.z * axes[2].dot(axis).abs()
}

/// Compute contacts between two cuboids
///
/// Returns an empty vector when a separating axis (beyond the envelope)
/// exists.
pub(crate) fn cuboid_cuboid(
    pose_a: &Pose,
    half_a: Vec3,
    pose_b: &Pose,
    half_b: Vec3,
    envelope: f32,
) -> Vec<GeomContact> {
    let rot_a = pose_a.rotation_matrix();
    let rot_b = pose_b.rotation_matrix();
    let axes_a = [
        rot_a.column(0).into_owned(),
        rot_a.column(1).into_owned(),
        rot_a.column(2).into_owned(),
    ];
    let axes_b = [
        rot_b.column(0).into_owned(),
        rot_b.column(1).into_owned(),
        rot_b.column(2).into_owned(),
    ];
    let d = pose_b.position - pose_a.position;

    let mut best_overlap = f32::MAX;
    let mut best_axis = BestAxis::FaceA(0);
    let mut best_dir = Vec3::x();

    let mut test_axis = |axis: Vec3, kind: BestAxis| -> bool {
        let overlap = projected_radius(half_a, &axes_a, &axis)
            + projected_radius(half_b, &axes_b, &axis)
            - d.dot(&axis).abs();
        if overlap < -envelope {
            return false; // separating axis
        }
        let better = match kind {
            BestAxis::Edge(..) => overlap + EDGE_AXIS_BIAS < best_overlap,
            _ => overlap < best_overlap,
        };
        if better {
            best_overlap = overlap;
            best_axis = kind;
            best_dir = axis;
        }
        true
    };

    for i in 0..3 {
        if !test_axis(axes_a[i], BestAxis::FaceA(i)) {
            return Vec::new();
        }
    }
    for j in 0..3 {
        if !test_axis(axes_b[j], BestAxis::FaceB(j)) {
            return Vec::new();
        }
    }
    for i in 0..3 {
        for j in 0..3 {
            let cross = axes_a[i].cross(&axes_b[j]);
            let len_sq = cross.norm_squared();
            if len_sq < 1e-8 {
                continue; // near-parallel edges, covered by the face axes
            }
            if !test_axis(cross / len_sq.sqrt(), BestAxis::Edge(i, j)) {
                return Vec::new();
            }
        }
    }

    // Contact normal points from A toward B.
    let normal = if d.dot(&best_dir) >= 0.0 { best_dir } else { -best_dir };

    match best_axis {
        BestAxis::FaceA(_) => {
            face_contacts(pose_a, half_a, pose_b, half_b, &axes_b, normal, false, envelope)
        }
        BestAxis::FaceB(_) => {
            // Reference is B, so the reported normal is flipped back to
            // the A-toward-B convention inside the clipper.
            face_contacts(pose_b, half_b, pose_a, half_a, &axes_a, -normal, true, envelope)
        }
        BestAxis::Edge(i, j) => {
            edge_contact(pose_a, half_a, &axes_a, i, pose_b, half_b, &axes_b, j, normal, best_overlap)
        }
    }
}

/// Clip the incident face of the other box against the reference face
///
/// `n_out` is the outward normal of the reference box toward the incident
/// box. Up to 4 of the deepest clipped points survive.
fn face_contacts(
    ref_pose: &Pose,
    ref_half: Vec3,
    inc_pose: &Pose,
    inc_half: Vec3,
    inc_axes: &[Vec3; 3],
    n_out: Vec3,
    flip_reported_normal: bool,
    envelope: f32,
) -> Vec<GeomContact> {
    // Reference face: the local axis most aligned with n_out.
    let n_local = ref_pose.inverse_transform_vector(n_out);
    let mut ref_axis = 0;
    for k in 1..3 {
        if n_local[k].abs() > n_local[ref_axis].abs() {
            ref_axis = k;
        }
    }
    let ref_sign = if n_local[ref_axis] >= 0.0 { 1.0 } else { -1.0 };

    // Incident face: the face of the other box most anti-parallel to n_out.
    let mut inc_axis = 0;
    let mut max_dot = 0.0_f32;
    for (k, axis) in inc_axes.iter().enumerate() {
        let dot = axis.dot(&n_out);
        if dot.abs() > max_dot.abs() {
            max_dot = dot;
            inc_axis = k;
        }
    }
    let inc_normal = inc_axes[inc_axis] * (-max_dot.signum());
    let face_center = inc_pose.position + inc_normal * inc_half[inc_axis];
    let (u_axis, v_axis) = other_two(inc_axis);
    let u = inc_axes[u_axis] * inc_half[u_axis];
    let v = inc_axes[v_axis] * inc_half[v_axis];

    // Incident face corners, in the reference box's local frame.
    let mut poly: Vec<Vec3> = [
        face_center + u + v,
        face_center + u - v,
        face_center - u - v,
        face_center - u + v,
    ]
    .iter()
    .map(|p| ref_pose.inverse_transform_point(*p))
    .collect();

    // Clip against the 4 side planes of the reference face.
    let (t1, t2) = other_two(ref_axis);
    for (axis, limit) in [(t1, ref_half[t1]), (t2, ref_half[t2])] {
        poly = clip_axis(&poly, axis, limit);
        poly = clip_axis_neg(&poly, axis, limit);
        if poly.is_empty() {
            return Vec::new();
        }
    }

    // Keep points at or below the reference face (within the envelope).
    let mut contacts: Vec<GeomContact> = poly
        .into_iter()
        .filter_map(|p| {
            let depth = ref_half[ref_axis] - ref_sign * p[ref_axis];
            if depth < -envelope {
                return None;
            }
            let world = ref_pose.transform_point(p);
            // Midway between the incident point and the reference plane.
            let point = world + n_out * (depth * 0.5);
            Some(GeomContact {
                point,
                normal: if flip_reported_normal { -n_out } else { n_out },
                depth,
            })
        })
        .collect();

    // A clipped octagon can yield more than 4 points; keep the deepest 4.
    if contacts.len() > 4 {
        contacts.sort_by(|a, b| b.depth.total_cmp(&a.depth));
        contacts.truncate(4);
    }
    contacts
}

/// Sutherland-Hodgman clip of a polygon against `p[axis] <= limit`
fn clip_axis(poly: &[Vec3], axis: usize, limit: f32) -> Vec<Vec3> {
    clip(poly, |p| limit - p[axis])
}

/// Clip against `p[axis] >= -limit`
fn clip_axis_neg(poly: &[Vec3], axis: usize, limit: f32) -> Vec<Vec3> {
    clip(poly, |p| p[axis] + limit)
}

/// Keep the polygon region where `dist(p) >= 0`, interpolating crossings
fn clip(poly: &[Vec3], dist: impl Fn(&Vec3) -> f32) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(poly.len() + 2);
    for (i, current) in poly.iter().enumerate() {
        let next = &poly[(i + 1) % poly.len()];
        let d0 = dist(current);
        let d1 = dist(next);
        if d0 >= 0.0 {
            out.push(*current);
        }
        if (d0 > 0.0 && d1 < 0.0) || (d0 < 0.0 && d1 > 0.0) {
            let t = d0 / (d0 - d1);
            out.push(current + (next - current) * t);
        }
    }
    out
}

/// The indices of the two axes other than `axis`
fn other_two(axis: usize) -> (usize, usize) {
    match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

/// Single contact at the closest points of the two supporting edges
fn edge_contact(
    pose_a: &Pose,
    half_a: Vec3,
    axes_a: &[Vec3; 3],
    edge_a: usize,
    pose_b: &Pose,
    half_b: Vec3,
    axes_b: &[Vec3; 3],
    edge_b: usize,
    normal: Vec3,
    depth: f32,
) -> Vec<GeomContact> {
    // Support edge on A: the edge parallel to axis `edge_a` farthest
    // along the contact normal; on B, farthest against it.
    let mut center_a = pose_a.position;
    for k in 0..3 {
        if k != edge_a {
            let sign = if axes_a[k].dot(&normal) >= 0.0 { 1.0 } else { -1.0 };
            center_a += axes_a[k] * (half_a[k] * sign);
        }
    }
    let mut center_b = pose_b.position;
    for k in 0..3 {
        if k != edge_b {
            let sign = if axes_b[k].dot(&normal) >= 0.0 { -1.0 } else { 1.0 };
            center_b += axes_b[k] * (half_b[k] * sign);
        }
    }

    // Closest points between the two edge lines, clamped to edge length.
    let ua = axes_a[edge_a];
    let ub = axes_b[edge_b];
    let r = center_b - center_a;
    let dot = ua.dot(&ub);
    let denom = 1.0 - dot * dot;
    let (s, t) = if denom.abs() < 1e-8 {
        (0.0, 0.0)
    } else {
        let d1 = r.dot(&ua);
        let d2 = r.dot(&ub);
        (
            ((d1 - dot * d2) / denom).clamp(-half_a[edge_a], half_a[edge_a]),
            ((dot * d1 - d2) / denom).clamp(-half_b[edge_b], half_b[edge_b]),
        )
    };
    let point_a = center_a + ua * s;
    let point_b = center_b + ub * t;

    vec![GeomContact {
        point: (point_a + point_b) * 0.5,
        normal,
        depth,
    }]
}
