//! Combined relative/absolute floating-point equality.
//!
//! Always compare weights with this helper rather than `==`: the absolute
//! tolerance test fails when the operands are large, and the relative
//! tolerance test fails when they are small. Combining both, per
//! <http://realtimecollisiondetection.net/books/rtcd/> page 443, handles
//! the full range of weight magnitudes the walk produces (including the
//! saturating "infinite" weight of zero-usage leaves).

/// Returns `true` if `a` and `b` are equal within `f64::EPSILON` scaled by
/// the larger of their magnitudes (floored at `1.0`).
#[must_use]
pub fn nearly_equal(a: f64, b: f64) -> bool {
    let threshold = f64::EPSILON * a.abs().max(b.abs()).max(1.0);
    (a - b).abs() < threshold
}
