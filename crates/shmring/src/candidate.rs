//! Fixed-size payloads that can live in a shared slot.

use crate::invariants::debug_assert_candidate_len;
use crate::CandidateError;
use std::fmt;

/// Items per candidate unless configured otherwise.
pub const DEFAULT_MAX_ITEMS: usize = 8;

/// Marker for types that may be copied into and out of shared memory.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` (or a primitive), contain no pointers,
/// references or handles, and every bit pattern written by `publish` must be
/// valid to read back in another process.
pub unsafe trait SlotPayload: Copy + Send + 'static {}

macro_rules! impl_slot_payload {
    ($($t:ty),*) => {
        $(unsafe impl SlotPayload for $t {})*
    };
}

impl_slot_payload!(u8, u16, u32, u64, i8, i16, i32, i64);

/// A directed edge `u-v`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Edge {
    pub u: u32,
    pub v: u32,
}

impl Edge {
    pub const fn new(u: u32, v: u32) -> Self {
        Self { u, v }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.u, self.v)
    }
}

unsafe impl SlotPayload for Edge {}

/// One proposed solution: the edges to remove.
///
/// `MAX` fixes the slot size at compile time. Entries past `len` are zero and
/// never exposed.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Candidate<const MAX: usize = DEFAULT_MAX_ITEMS> {
    len: u32,
    items: [Edge; MAX],
}

impl<const MAX: usize> Candidate<MAX> {
    /// Number of items a slot can hold.
    pub const MAX_ITEMS: usize = MAX;

    /// Creates an empty candidate (an optimal solution if published as is).
    pub const fn new() -> Self {
        Self {
            len: 0,
            items: [Edge::new(0, 0); MAX],
        }
    }

    /// Builds a candidate from a slice, rejecting slices longer than `MAX`.
    pub fn from_edges(edges: &[Edge]) -> Result<Self, CandidateError> {
        let mut candidate = Self::new();
        for &edge in edges {
            candidate.push(edge)?;
        }
        Ok(candidate)
    }

    /// Appends an edge. Fails instead of truncating when full.
    pub fn push(&mut self, edge: Edge) -> Result<(), CandidateError> {
        let len = self.len();
        if len == MAX {
            return Err(CandidateError::Full { max: MAX });
        }
        self.items[len] = edge;
        self.len += 1;
        debug_assert_candidate_len!(self.len as usize, MAX);
        Ok(())
    }

    /// Number of valid items.
    #[inline]
    pub fn len(&self) -> usize {
        // A slot written by a foreign process is clamped rather than trusted.
        (self.len as usize).min(MAX)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` when no more items fit.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == MAX
    }

    /// The valid items.
    #[inline]
    pub fn as_slice(&self) -> &[Edge] {
        &self.items[..self.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.as_slice().iter()
    }

    /// Empties the candidate and zeroes its storage.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl<const MAX: usize> Default for Candidate<MAX> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX: usize> PartialEq for Candidate<MAX> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<const MAX: usize> Eq for Candidate<MAX> {}

impl<const MAX: usize> fmt::Debug for Candidate<MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<const MAX: usize> fmt::Display for Candidate<MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, edge) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{edge}")?;
        }
        Ok(())
    }
}

unsafe impl<const MAX: usize> SlotPayload for Candidate<MAX> {}
