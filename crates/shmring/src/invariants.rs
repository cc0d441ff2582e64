//! Debug assertion macros for ring buffer invariants.
//!
//! They are only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

// =============================================================================
// Bounded Count
// =============================================================================

/// Assert that unread candidates never exceed capacity.
///
/// **Invariant**: `0 ≤ (published - consumed) ≤ capacity`
///
/// Used in: `RingBuffer::take_slot()` before releasing the slot
macro_rules! debug_assert_bounded_count {
    ($unread:expr, $capacity:expr) => {
        debug_assert!(
            $unread <= $capacity as u64,
            "bounded count violated: {} unread candidates exceed capacity {}",
            $unread,
            $capacity
        )
    };
}

// =============================================================================
// Cursor Range
// =============================================================================

/// Assert that a cursor read from the segment indexes a real slot.
///
/// **Invariant**: `0 ≤ pos < capacity`
///
/// Used in: `Producer::publish()` for `write_pos`, `RingBuffer::take_slot()` for `read_pos`
macro_rules! debug_assert_cursor_in_range {
    ($name:literal, $pos:expr, $capacity:expr) => {
        debug_assert!(
            $pos < $capacity,
            "cursor violated: {} = {} outside 0..{}",
            $name,
            $pos,
            $capacity
        )
    };
}

// =============================================================================
// Candidate Length
// =============================================================================

/// Assert that a candidate never holds more items than its slot allows.
///
/// **Invariant**: `len ≤ MAX`
///
/// Used in: `Candidate::push()`
macro_rules! debug_assert_candidate_len {
    ($len:expr, $max:expr) => {
        debug_assert!(
            $len <= $max,
            "candidate length {} exceeds slot limit {}",
            $len,
            $max
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_candidate_len;
pub(crate) use debug_assert_cursor_in_range;
