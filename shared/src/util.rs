use macroquad::math::Vec3;
use std::f32::consts::{PI, TAU};

/// Angle of a direction in the horizontal (XZ) plane, measured from +X towards +Z.
#[inline(always)]
pub fn heading_angle(direction: Vec3) -> f32 {
    direction.z.atan2(direction.x)
}

/// Unit vector in the horizontal plane for the given angle.
#[inline(always)]
pub fn direction_from_angle(angle: f32) -> Vec3 {
    let (sin_a, cos_a) = angle.sin_cos();
    Vec3::new(cos_a, 0.0, sin_a)
}

/// Wraps an angle into `(-PI, PI]`.
#[inline(always)]
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Signed shortest difference `to - from`, in `(-PI, PI]`.
#[inline(always)]
pub fn angle_delta(from: f32, to: f32) -> f32 {
    wrap_angle(to - from)
}

/// Interpolates between two angles along the shorter arc.
#[inline(always)]
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    wrap_angle(from + angle_delta(from, to) * t)
}

/// Rotates a vector around the vertical axis, in the same sense as `heading_angle`.
#[inline(always)]
pub fn rotate_about_up(v: Vec3, angle: f32) -> Vec3 {
    let (sin_a, cos_a) = angle.sin_cos();
    Vec3::new(v.x * cos_a - v.z * sin_a, v.y, v.x * sin_a + v.z * cos_a)
}

/// Drops the vertical component.
#[inline(always)]
pub fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Angle between two vectors, or `None` if either is degenerate.
pub fn angle_between(a: Vec3, b: Vec3) -> Option<f32> {
    let denom = a.length() * b.length();
    if denom <= f32::EPSILON || !denom.is_finite() {
        return None;
    }
    Some((a.dot(b) / denom).clamp(-1.0, 1.0).acos())
}
