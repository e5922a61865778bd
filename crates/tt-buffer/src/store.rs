//! `StreamlineBuffer`: dense point storage plus per-streamline SoA state.
//!
//! # Layout
//!
//! Points live in one row-major `Vec<Point3>` of shape
//! `[count, capacity]`; row `i` holds streamline `i` from its seed onward.
//! Only the first `lengths[i]` points of a row are meaningful.  Everything
//! else is per-streamline SoA, indexed by `StreamlineId`:
//!
//! ```ignore
//! let path = buffer.streamline(id);           // &[Point3], valid prefix only
//! let why  = buffer.flags[id.index()];        // StoppingFlags
//! ```
//!
//! Capacity only grows, and only through [`StreamlineBuffer::grow`], which
//! copies every row into a larger allocation and swaps it in.  Row indices
//! never change, so a `StreamlineId` refers to the same seed for the whole
//! life of the batch.

use tt_core::{Point3, SeedId, StoppingFlags, StreamlineId};

use crate::{BufferError, BufferResult};

/// Structure-of-Arrays storage for a batch of streamlines.
pub struct StreamlineBuffer {
    /// Number of streamlines.  Equals the length of every SoA `Vec`.
    pub count: usize,

    /// Points per row.
    capacity: usize,

    /// Row-major `[count, capacity]` point storage.
    points: Vec<Point3>,

    /// Number of valid points per row (the seed counts as one).
    pub lengths: Vec<u32>,

    /// Terminal stopping reasons.  Empty until the streamline is done.
    pub flags: Vec<StoppingFlags>,

    /// `true` once the streamline has left the active set.  Never reset.
    pub dones: Vec<bool>,

    /// Initial point of every row, kept separately so exports can report it
    /// even if row 0 were ever rewritten.
    pub seeds: Vec<Point3>,

    /// Seed-pool index each row was created from.
    pub seed_ids: Vec<SeedId>,
}

impl StreamlineBuffer {
    /// Allocate one row of `capacity` points per seed and write the seeds.
    pub fn new(seeds: &[Point3], seed_ids: Vec<SeedId>, capacity: usize) -> BufferResult<Self> {
        if capacity == 0 {
            return Err(BufferError::Config("capacity must hold at least the seed point".into()));
        }
        if seed_ids.len() != seeds.len() {
            return Err(BufferError::CountMismatch {
                expected: seeds.len(),
                got:      seed_ids.len(),
                what:     "seed ids",
            });
        }
        let count = seeds.len();
        let mut points = vec![Point3::ZERO; count * capacity];
        for (i, &seed) in seeds.iter().enumerate() {
            points[i * capacity] = seed;
        }
        Ok(Self {
            count,
            capacity,
            points,
            lengths:  vec![1; count],
            flags:    vec![StoppingFlags::empty(); count],
            dones:    vec![false; count],
            seeds:    seeds.to_vec(),
            seed_ids,
        })
    }

    // ── Shape ─────────────────────────────────────────────────────────────

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterator over all `StreamlineId`s in ascending row order.
    pub fn ids(&self) -> impl Iterator<Item = StreamlineId> + '_ {
        (0..self.count as u32).map(StreamlineId)
    }

    #[inline]
    pub fn len_of(&self, id: StreamlineId) -> usize {
        self.lengths[id.index()] as usize
    }

    // ── Validation ────────────────────────────────────────────────────────

    /// `Ok` if `id` is in range and still active.
    #[inline]
    pub fn check_active(&self, id: StreamlineId) -> BufferResult<()> {
        match self.dones.get(id.index()) {
            Some(false) => Ok(()),
            _ => Err(BufferError::InvalidIndex(id)),
        }
    }

    // ── Slicing ───────────────────────────────────────────────────────────

    /// Valid points of streamline `id`, seed first.
    #[inline]
    pub fn streamline(&self, id: StreamlineId) -> &[Point3] {
        let start = id.index() * self.capacity;
        &self.points[start..start + self.len_of(id)]
    }

    /// The whole row, including slots past the valid length.
    #[inline]
    pub fn row(&self, id: StreamlineId) -> &[Point3] {
        let start = id.index() * self.capacity;
        &self.points[start..start + self.capacity]
    }

    /// Last valid point of streamline `id`.
    #[inline]
    pub fn head(&self, id: StreamlineId) -> Point3 {
        self.points[id.index() * self.capacity + self.len_of(id) - 1]
    }

    // ── Mutation ──────────────────────────────────────────────────────────

    /// Write `point` just past the valid prefix without extending it.
    ///
    /// The integrator stages the whole batch with this before bumping any
    /// length, so a failed step leaves no visible trace.
    pub(crate) fn stage_next(&mut self, id: StreamlineId, point: Point3) -> BufferResult<()> {
        let len = self.len_of(id);
        if len >= self.capacity {
            return Err(BufferError::CapacityExceeded { streamline: id, capacity: self.capacity });
        }
        self.points[id.index() * self.capacity + len] = point;
        Ok(())
    }

    /// Replace the valid prefix of an active row with `points`.
    ///
    /// Used by the rollout commit to splice a recovered continuation in.
    /// `points` must start with the row's seed and fit in the current
    /// capacity; grow the buffer first otherwise.
    pub fn overwrite(&mut self, id: StreamlineId, points: &[Point3]) -> BufferResult<()> {
        self.check_active(id)?;
        if points.is_empty() {
            return Err(BufferError::Config("a streamline keeps at least its seed".into()));
        }
        if points.len() > self.capacity {
            return Err(BufferError::CapacityExceeded { streamline: id, capacity: self.capacity });
        }
        let start = id.index() * self.capacity;
        self.points[start..start + points.len()].copy_from_slice(points);
        self.lengths[id.index()] = points.len() as u32;
        Ok(())
    }

    /// Mark `id` finished with its terminal `flags`.
    ///
    /// Fails with `InvalidIndex` if `id` is already done: a streamline
    /// finishes exactly once.
    pub fn finish(&mut self, id: StreamlineId, flags: StoppingFlags) -> BufferResult<()> {
        self.check_active(id)?;
        self.flags[id.index()] = flags;
        self.dones[id.index()] = true;
        Ok(())
    }

    /// Grow every row to `new_capacity` points (copy-and-replace).
    ///
    /// Existing points are copied bit-for-bit and row indices are preserved.
    /// The new storage is fully built before it replaces the old one.
    /// A request that does not exceed the current capacity is a no-op.
    pub fn grow(&mut self, new_capacity: usize) {
        if new_capacity <= self.capacity {
            return;
        }
        let mut points = vec![Point3::ZERO; self.count * new_capacity];
        for (old_row, new_row) in self
            .points
            .chunks_exact(self.capacity)
            .zip(points.chunks_exact_mut(new_capacity))
        {
            new_row[..self.capacity].copy_from_slice(old_row);
        }
        self.points = points;
        self.capacity = new_capacity;
    }
}
