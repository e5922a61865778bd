//! Turning a streamline history into whatever the policy consumes.
//!
//! The environment never looks inside a state; it just calls the formatter
//! once per streamline whenever it reports states (after `step` and at
//! `harvest`).

use tt_core::{Point3, StreamlineId};

/// Builds the policy-facing state of one streamline.
///
/// Implementations must be deterministic in `history`.
pub trait StateFormatter: Send + Sync + 'static {
    type State;

    fn format(&self, streamline: StreamlineId, history: &[Point3]) -> Self::State;
}

/// The newest point of the streamline.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeadPosition;

impl StateFormatter for HeadPosition {
    type State = Point3;

    fn format(&self, _streamline: StreamlineId, history: &[Point3]) -> Point3 {
        history.last().copied().unwrap_or(Point3::ZERO)
    }
}

/// The head position followed by the last `n` unit step directions, newest
/// first, flattened to `3 * (n + 1)` floats.  Missing directions (early in
/// tracking) are zero.
#[derive(Clone, Copy, Debug)]
pub struct RecentDirections {
    pub n: usize,
}

impl StateFormatter for RecentDirections {
    type State = Vec<f32>;

    fn format(&self, _streamline: StreamlineId, history: &[Point3]) -> Vec<f32> {
        let mut out = Vec::with_capacity(3 * (self.n + 1));
        let head = history.last().copied().unwrap_or(Point3::ZERO);
        out.extend_from_slice(&head.to_array());

        let mut written = 0;
        for pair in history.windows(2).rev().take(self.n) {
            out.extend_from_slice(&(pair[1] - pair[0]).scaled_to(1.0).to_array());
            written += 1;
        }
        out.resize(out.len() + 3 * (self.n - written), 0.0);
        out
    }
}
