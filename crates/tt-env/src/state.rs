//! `TrackingState`: everything one batch carries between calls.

use tt_buffer::StreamlineBuffer;
use tt_core::{StoppingFlags, StreamlineId};

/// Re-indexing computed by `step`, applied by `harvest`.
pub(crate) struct PendingHarvest {
    /// Survivors in pre-step order, then recovered streamlines in recovery
    /// order.
    pub(crate) next_active:  Vec<StreamlineId>,
    /// Aligned to the pre-step active set.
    pub(crate) continuation: Vec<bool>,
}

/// State of one tracking batch, created by
/// [`TrackingEnv::reset`][crate::TrackingEnv::reset] and threaded through
/// `step`, `harvest` and `finalize`.
///
/// The caller owns it exclusively; the environment itself holds no
/// per-batch data.
pub struct TrackingState {
    pub(crate) buffer:  StreamlineBuffer,
    pub(crate) batch:   u64,
    pub(crate) active:  Vec<StreamlineId>,
    pub(crate) step:    u64,
    pub(crate) pending: Option<PendingHarvest>,
}

impl TrackingState {
    pub(crate) fn new(buffer: StreamlineBuffer, batch: u64) -> Self {
        let active = buffer.ids().collect();
        Self { buffer, batch, active, step: 0, pending: None }
    }

    /// Read-only view of the streamline storage.
    #[inline]
    pub fn buffer(&self) -> &StreamlineBuffer {
        &self.buffer
    }

    /// Number of resets of the environment before this batch.
    #[inline]
    pub fn batch(&self) -> u64 {
        self.batch
    }

    /// The active set as of the last `reset` or `harvest`.
    ///
    /// Between `step` and `harvest` this still lists the pre-step set, some
    /// of which may already be done.
    #[inline]
    pub fn active(&self) -> &[StreamlineId] {
        &self.active
    }

    /// Number of completed `step` calls.
    #[inline]
    pub fn step_count(&self) -> u64 {
        self.step
    }

    #[inline]
    pub fn has_pending_harvest(&self) -> bool {
        self.pending.is_some()
    }

    /// Streamlines not yet done.
    pub fn active_count(&self) -> usize {
        self.buffer.dones.iter().filter(|&&d| !d).count()
    }

    /// Streamlines done, for any reason.
    pub fn finished_count(&self) -> usize {
        self.buffer.count - self.active_count()
    }

    /// `true` once no streamline can be stepped any more.
    pub fn is_finished(&self) -> bool {
        self.active_count() == 0
    }

    /// Terminal flags of `id`; empty while it is still active.
    #[inline]
    pub fn flags_of(&self, id: StreamlineId) -> StoppingFlags {
        self.buffer.flags[id.index()]
    }
}
