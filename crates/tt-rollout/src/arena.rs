//! Bounded scratch storage for one recovery pass.
//!
//! The arena is allocated once per pass with one fixed-size slot per
//! (streamline, candidate) pair, laid out streamline-major:
//!
//! ```text
//! slot k  ↔  streamline k / n_rollouts, candidate k % n_rollouts
//! ```
//!
//! [`ScratchArena::slots_mut`] hands out disjoint `&mut` views, so candidates
//! can be rolled out concurrently without synchronisation.

use tt_core::Point3;

/// Fixed-capacity scratch regions for rollout candidates.
pub struct ScratchArena {
    slot_capacity: usize,
    points:        Vec<Point3>,
}

impl ScratchArena {
    /// Allocate `slots` regions of `slot_capacity` points each.
    pub fn new(slots: usize, slot_capacity: usize) -> Self {
        Self {
            slot_capacity,
            points: vec![Point3::ZERO; slots * slot_capacity],
        }
    }

    #[inline]
    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    pub fn slot_count(&self) -> usize {
        self.points.len().checked_div(self.slot_capacity).unwrap_or(0)
    }

    /// Disjoint mutable views of every slot, in slot order, all empty.
    pub fn slots_mut(&mut self) -> Vec<ScratchSlot<'_>> {
        if self.slot_capacity == 0 {
            return Vec::new();
        }
        self.points
            .chunks_exact_mut(self.slot_capacity)
            .map(|points| ScratchSlot { points, len: 0 })
            .collect()
    }

    /// The first `len` points of slot `k`.
    #[inline]
    pub fn slot(&self, k: usize, len: usize) -> &[Point3] {
        let start = k * self.slot_capacity;
        &self.points[start..start + len]
    }
}

/// A single candidate's private region.
pub struct ScratchSlot<'a> {
    points: &'a mut [Point3],
    len:    usize,
}

impl ScratchSlot<'_> {
    /// Replace the contents with `prefix`.  Returns `false` (and leaves the
    /// slot empty) if `prefix` does not fit.
    pub fn reset_from(&mut self, prefix: &[Point3]) -> bool {
        if prefix.len() > self.points.len() {
            self.len = 0;
            return false;
        }
        self.points[..prefix.len()].copy_from_slice(prefix);
        self.len = prefix.len();
        true
    }

    /// Append one point.  Returns `false` if the slot is full.
    pub fn push(&mut self, p: Point3) -> bool {
        match self.points.get_mut(self.len) {
            Some(slot) => {
                *slot = p;
                self.len += 1;
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn history(&self) -> &[Point3] {
        &self.points[..self.len]
    }
}
