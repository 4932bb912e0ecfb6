//! Pure dimension arithmetic for resizing and fitting.
//!
//! All scaling uses integer math with round-half-up so results are exact
//! and reproducible across platforms.

use super::options::Dimension;

/// Width and height in pixels.
pub type Size = (u32, u32);

/// A rectangle within the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// `value * num / den`, rounded to the nearest integer and never below 1.
#[inline]
fn scale_round(value: u32, num: u32, den: u32) -> u32 {
    let (value, num, den) = (value as u128, num as u128, den.max(1) as u128);
    let scaled = (2 * value * num + den) / (2 * den);
    scaled.clamp(1, u32::MAX as u128) as u32
}

/// Resolve requested dimensions against the source size.
///
/// - Both `Auto`: the source size, unchanged.
/// - One explicit: the other is derived from the source aspect ratio.
/// - Both explicit: used as given.
pub fn resolve_box(source: Size, width: Dimension, height: Dimension) -> Size {
    let (src_w, src_h) = source;

    match (width.pixels(), height.pixels()) {
        (None, None) => source,
        (Some(w), None) => (w, scale_round(src_h, w, src_w)),
        (None, Some(h)) => (scale_round(src_w, h, src_h), h),
        (Some(w), Some(h)) => (w, h),
    }
}

/// Largest aspect-preserving size that fits inside `target`.
///
/// Both result dimensions are `<=` the box.
pub fn contain_size(source: Size, target: Size) -> Size {
    let (src_w, src_h) = source;
    let (box_w, box_h) = target;

    // Compare box_w/src_w against box_h/src_h without division
    if box_w as u64 * src_h as u64 <= box_h as u64 * src_w as u64 {
        (box_w, scale_round(src_h, box_w, src_w).min(box_h))
    } else {
        (scale_round(src_w, box_h, src_h).min(box_w), box_h)
    }
}

/// Smallest aspect-preserving size that covers `target`.
///
/// Both result dimensions are `>=` the box.
pub fn cover_size(source: Size, target: Size) -> Size {
    let (src_w, src_h) = source;
    let (box_w, box_h) = target;

    if box_w as u64 * src_h as u64 >= box_h as u64 * src_w as u64 {
        (box_w, scale_round(src_h, box_w, src_w).max(box_h))
    } else {
        (scale_round(src_w, box_h, src_h).max(box_w), box_h)
    }
}

/// Centered rectangle of size `target` inside `source`.
///
/// Returns `None` when the box is larger than the source on either axis.
pub fn centered_crop(source: Size, target: Size) -> Option<Rect> {
    let (src_w, src_h) = source;
    let (box_w, box_h) = target;

    if box_w > src_w || box_h > src_h {
        return None;
    }

    Some(Rect {
        x: (src_w - box_w) / 2,
        y: (src_h - box_h) / 2,
        width: box_w,
        height: box_h,
    })
}
