use glam::Mat4;

/// Smallest power of two that is `>= x` (1 for anything below 2), or
/// `None` when that power does not fit in an `i32`.
///
/// Textures are allocated at this size and texture coordinates are
/// normalized against it, so both sides must use this one routine.
#[inline(always)]
pub const fn next_power_of_2(x: i32) -> Option<i32> {
    if x < 2 {
        return Some(1);
    }
    match (x as u32).checked_next_power_of_two() {
        Some(p) if p <= i32::MAX as u32 => Some(p as i32),
        _ => None,
    }
}

/// Padded allocation size for a `width` x `height` image.
#[inline(always)]
pub const fn padded_size(width: i32, height: i32) -> Option<(i32, i32)> {
    match (next_power_of_2(width), next_power_of_2(height)) {
        (Some(w), Some(h)) => Some((w, h)),
        _ => None,
    }
}

/// Pixel-space projection with the origin at the top-left corner.
pub fn ortho_for_window(width: u32, height: u32) -> Mat4 {
    Mat4::orthographic_rh_gl(0.0, width as f32, height as f32, 0.0, -1.0, 1.0)
}

/// Pixel-space projection for an offscreen target, whose rows are stored
/// bottom-up.
pub fn ortho_for_offscreen(width: u32, height: u32) -> Mat4 {
    Mat4::orthographic_rh_gl(0.0, width as f32, 0.0, height as f32, -1.0, 1.0)
}
