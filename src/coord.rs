//! Conversion from id Software's Z-up right handed space to the Y-up space used for rendering.

use glam::{Vec2, Vec3, Vec4};

/// Axis permutation `(x, y, z) -> (x, z, -y)`.
///
/// id right stays right, id up (z) becomes y, id forward (y) becomes -z.
pub fn id_to_gl(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, -v.y)
}

/// [`id_to_gl`] followed by a division by `scale`. A scale of `0` or `1` leaves the length alone.
pub fn id_to_gl_scaled(v: Vec3, scale: f32) -> Vec3 {
    let v = id_to_gl(v);
    if scale == 0.0 || (scale - 1.0).abs() <= f32::EPSILON {
        v
    } else {
        v / scale
    }
}

/// Flips the texture V axis.
pub fn flip_uv(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x, 1.0 - uv.y)
}

/// Converts a plane `n.p + d = 0` given in id space into the scaled target space.
pub fn id_plane_to_gl(plane: Vec4, scale: f32) -> Vec4 {
    let normal = id_to_gl(plane.truncate());
    let d = if scale == 0.0 || (scale - 1.0).abs() <= f32::EPSILON {
        plane.w
    } else {
        plane.w / scale
    };
    normal.extend(d)
}
