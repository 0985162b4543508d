//! Small vector/quaternion helpers on plain arrays.
//!
//! - vectors are `[f32; 3]`
//! - quaternions are `[f32; 4]` in (x, y, z, w) order
//! - `slerp_quat` takes the shortest arc and degrades to NLERP when nearly parallel
//! - `smoothstep` is the easing curve used for blend weights

pub type Vec3 = [f32; 3];
pub type Quat = [f32; 4];

pub const VEC3_ZERO: Vec3 = [0.0, 0.0, 0.0];
pub const QUAT_IDENTITY: Quat = [0.0, 0.0, 0.0, 1.0];

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

#[inline]
pub fn add_vec3(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub_vec3(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn scale_vec3(a: Vec3, s: f32) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub fn length_vec3(a: Vec3) -> f32 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

#[inline]
fn dot4(a: Quat, b: Quat) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Normalize a quaternion. Degenerate input (zero or non-finite length) yields identity.
#[inline]
pub fn normalize_quat(q: Quat) -> Quat {
    let len = dot4(q, q).sqrt();
    if len > 0.0 && len.is_finite() {
        let inv = len.recip();
        [q[0] * inv, q[1] * inv, q[2] * inv, q[3] * inv]
    } else {
        QUAT_IDENTITY
    }
}

/// Hamilton product `a * b` (apply `b` first, then `a`).
#[inline]
pub fn quat_mul(a: Quat, b: Quat) -> Quat {
    let [ax, ay, az, aw] = a;
    let [bx, by, bz, bw] = b;
    [
        aw * bx + ax * bw + ay * bz - az * by,
        aw * by - ax * bz + ay * bw + az * bx,
        aw * bz + ax * by - ay * bx + az * bw,
        aw * bw - ax * bx - ay * by - az * bz,
    ]
}

/// Inverse of a unit quaternion.
#[inline]
pub fn quat_conjugate(q: Quat) -> Quat {
    [-q[0], -q[1], -q[2], q[3]]
}

/// Rotate a vector by a unit quaternion.
pub fn quat_rotate_vec3(q: Quat, v: Vec3) -> Vec3 {
    // v' = v + 2w(u x v) + 2u x (u x v)
    let u = [q[0], q[1], q[2]];
    let w = q[3];
    let uv = cross(u, v);
    let uuv = cross(u, uv);
    [
        v[0] + 2.0 * (w * uv[0] + uuv[0]),
        v[1] + 2.0 * (w * uv[1] + uuv[1]),
        v[2] + 2.0 * (w * uv[2] + uuv[2]),
    ]
}

#[inline]
fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Quaternion for a rotation of `angle` radians about `axis`.
pub fn quat_from_axis_angle(axis: Vec3, angle: f32) -> Quat {
    let len = length_vec3(axis);
    if len <= 0.0 {
        return QUAT_IDENTITY;
    }
    let (s, c) = (angle * 0.5).sin_cos();
    let k = s / len;
    [axis[0] * k, axis[1] * k, axis[2] * k, c]
}

/// Slerp between two quaternions along the shortest arc.
pub fn slerp_quat(a: Quat, b: Quat, t: f32) -> Quat {
    let qa = normalize_quat(a);
    let mut qb = normalize_quat(b);

    let mut dot = dot4(qa, qb);
    if dot < 0.0 {
        qb = [-qb[0], -qb[1], -qb[2], -qb[3]];
        dot = -dot;
    }

    // Nearly parallel: sin(theta) underflows, use normalized lerp.
    const DOT_THRESHOLD: f32 = 0.9995;
    if dot > DOT_THRESHOLD {
        return normalize_quat([
            lerp_f32(qa[0], qb[0], t),
            lerp_f32(qa[1], qb[1], t),
            lerp_f32(qa[2], qb[2], t),
            lerp_f32(qa[3], qb[3], t),
        ]);
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta_0 = theta_0.sin();
    let s0 = (theta_0 - theta).sin() / sin_theta_0;
    let s1 = theta.sin() / sin_theta_0;

    normalize_quat([
        s0 * qa[0] + s1 * qb[0],
        s0 * qa[1] + s1 * qb[1],
        s0 * qa[2] + s1 * qb[2],
        s0 * qa[3] + s1 * qb[3],
    ])
}

/// Angle in radians between two rotations (0 when equivalent).
pub fn quat_angle_between(a: Quat, b: Quat) -> f32 {
    let d = dot4(normalize_quat(a), normalize_quat(b)).abs().min(1.0);
    2.0 * d.acos()
}

/// Cubic ease-in/ease-out on [0, 1]: `t²(3 − 2t)`.
#[inline]
pub fn smoothstep(t: f32) -> f32 {
    let t = sanitize_unit(t);
    t * t * (3.0 - 2.0 * t)
}

/// Clamp into [0, 1]; NaN maps to 0.
#[inline]
pub fn sanitize_unit(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
