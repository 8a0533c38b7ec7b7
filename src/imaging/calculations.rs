//! Pure calculation functions for derivative dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Keep the requested widths that do not exceed the original width.
///
/// Order is preserved, so ascending input yields ascending output. Unlike a
/// "fit to original" fallback, an empty result stays empty: the caller decides
/// whether that is an error or a skip.
///
/// # Examples
/// ```
/// # use srcsetter::imaging::feasible_widths;
/// assert_eq!(feasible_widths(&[480, 768, 1200], 1000), vec![480, 768]);
/// assert!(feasible_widths(&[2000], 1200).is_empty());
/// ```
pub fn feasible_widths(requested: &[u32], original_width: u32) -> Vec<u32> {
    requested
        .iter()
        .copied()
        .filter(|&w| w <= original_width)
        .collect()
}

/// Height of a derivative scaled to `target_width`, preserving aspect ratio.
///
/// Never returns 0, so extremely wide panoramas still produce a valid image.
pub fn scaled_height(original: (u32, u32), target_width: u32) -> u32 {
    let (orig_w, orig_h) = original;
    if orig_w == 0 {
        return orig_h.max(1);
    }
    let ratio = target_width as f64 / orig_w as f64;
    ((orig_h as f64 * ratio).round() as u32).max(1)
}
