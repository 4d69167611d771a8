#![forbid(unsafe_code)]

//! Shallow equality over [`Props`].
//!
//! The single mechanism for deciding whether anything meaningfully changed.
//! Two mappings are shallow-equal iff they have the same key set and every
//! pair of values is [`Value::identical`](crate::Value::identical). Nested
//! containers are never inspected: replacing a nested map with a structurally
//! equal copy *is* a change, mutating state behind an unchanged reference is
//! not.

use crate::props::Props;

/// Key-wise identity comparison of two flat mappings.
#[must_use]
pub fn shallow_equal(a: &Props, b: &Props) -> bool {
    if a.ptr_eq(b) {
        return true;
    }
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|(key, left)| match b.get(key) {
        Some(right) => left.identical(right),
        None => false,
    })
}
