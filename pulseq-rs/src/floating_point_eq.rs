//! Equality and hashing for [`f64`] that is reflexive, so that types holding floats (such as
//! [`Value`](crate::expression::Value)) can implement [`Eq`] and [`Hash`](std::hash::Hash) and be
//! interned.
//!
//! `±0.0` are indistinguishable, and every NaN is equal to every other NaN (and to nothing else).

use std::hash::{Hash as _, Hasher};

/// Compare two [`f64`]s such that all `NaN`s are equal to each other.
///
/// Compatible with [`hash`].
#[inline]
pub(crate) fn eq(left: f64, right: f64) -> bool {
    left == right || left.is_nan() && right.is_nan()
}

/// Hash an [`f64`] such that `+0.0`/`-0.0` and all `NaN`s collide.
///
/// Compatible with [`eq`].
#[inline]
pub(crate) fn hash<H: Hasher>(value: f64, state: &mut H) {
    let canonical = if value == 0.0 {
        0.0f64
    } else if value.is_nan() {
        f64::NAN
    } else {
        value
    };

    canonical.to_bits().hash(state)
}
