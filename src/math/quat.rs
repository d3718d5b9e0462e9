// Quaternion helpers following the engine's column-vector conventions.
//
// The engine rotates a vector by `conj(q) * v * q`, so a stored rotation
// turns points the opposite way from what glm's `quat_rotate_vec3` does.
// Everything that walks node hierarchies goes through `apply` below.

use nalgebra_glm as glm;

pub fn quat_identity() -> glm::Quat {
    glm::quat(0.0, 0.0, 0.0, 1.0)
}

/// Rotate `v` the way the engine does: `conj(q) * v * q`.
pub fn apply(q: &glm::Quat, v: &glm::Vec3) -> glm::Vec3 {
    let p = glm::quat(v.x, v.y, v.z, 0.0);
    let r = glm::quat_conjugate(q) * p * q;
    glm::vec3(r.i, r.j, r.k)
}

/// Inverse that tolerates a zero quaternion (returned unchanged in scale).
pub fn inverse(q: &glm::Quat) -> glm::Quat {
    let mag = q.i * q.i + q.j * q.j + q.k * q.k + q.w * q.w;
    if mag == 1.0 {
        return glm::quat_conjugate(q);
    }
    let inv = if mag == 0.0 { 1.0 } else { 1.0 / mag };
    glm::quat(-q.i * inv, -q.j * inv, -q.k * inv, q.w * inv)
}

pub fn from_axis_angle(axis: &glm::Vec3, angle: f32) -> glm::Quat {
    let axis = glm::normalize(axis);
    let s = (angle * 0.5).sin();
    glm::quat_normalize(&glm::quat(axis.x * s, axis.y * s, axis.z * s, (angle * 0.5).cos()))
}

/// Row-major rotation matrix as stored in skin rest poses.
pub fn to_matrix(q: &glm::Quat) -> glm::Mat4 {
    let (x, y, z, w) = (q.i, q.j, q.k, q.w);
    let xx = x * x;
    let xy = x * y;
    let yy = y * y;
    let xz = x * z;
    let yz = y * z;
    let zz = z * z;
    let xw = x * w;
    let yw = y * w;
    let zw = z * w;

    glm::mat4(
        1.0 - 2.0 * (yy + zz), 2.0 * (xy - zw), 2.0 * (xz + yw), 0.0,
        2.0 * (xy + zw), 1.0 - 2.0 * (xx + zz), 2.0 * (yz - xw), 0.0,
        2.0 * (xz - yw), 2.0 * (yz + xw), 1.0 - 2.0 * (xx + yy), 0.0,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Transform that takes a point from shape space into the space of a node
/// whose world transform is `(trans, rot)`.
pub fn inverse_node_transform(trans: &glm::Vec3, rot: &glm::Quat) -> glm::Mat4 {
    let t = apply(&inverse(rot), &(-trans));
    let mut m = to_matrix(rot);
    m[(0, 3)] = t.x;
    m[(1, 3)] = t.y;
    m[(2, 3)] = t.z;
    m[(3, 3)] = 1.0;
    m
}

/// Component-wise comparison used by tests and the summary printer.
pub fn quat_approx_eq(a: &glm::Quat, b: &glm::Quat, tolerance: f32) -> bool {
    (a.i - b.i).abs() <= tolerance
        && (a.j - b.j).abs() <= tolerance
        && (a.k - b.k).abs() <= tolerance
        && (a.w - b.w).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn close(a: &glm::Vec3, b: &glm::Vec3) -> bool {
        (a - b).norm() < 1e-5
    }

    #[test]
    fn apply_rotates_by_conjugate() {
        let q = from_axis_angle(&glm::vec3(0.0, 0.0, 1.0), FRAC_PI_2);
        let v = apply(&q, &glm::vec3(1.0, 0.0, 0.0));
        // glm would give +y; the engine convention gives -y
        assert!(close(&v, &glm::vec3(0.0, -1.0, 0.0)), "{v:?}");
    }

    #[test]
    fn identity_leaves_points_alone() {
        let v = glm::vec3(1.5, -2.0, 3.25);
        assert!(close(&apply(&quat_identity(), &v), &v));
    }

    #[test]
    fn inverse_undoes_apply() {
        let q = from_axis_angle(&glm::vec3(1.0, 1.0, 0.0), 0.7);
        let v = glm::vec3(0.3, 0.2, -4.0);
        let back = apply(&inverse(&q), &apply(&q, &v));
        assert!(close(&back, &v));
    }

    #[test]
    fn inverse_node_transform_maps_node_origin_to_zero() {
        let rot = from_axis_angle(&glm::vec3(0.0, 1.0, 0.0), 0.4);
        let trans = glm::vec3(2.0, 0.0, -1.0);
        let m = inverse_node_transform(&trans, &rot);
        let p = m * glm::vec4(trans.x, trans.y, trans.z, 1.0);
        assert!(glm::vec3(p.x, p.y, p.z).norm() < 1e-5, "{p:?}");
    }
}
