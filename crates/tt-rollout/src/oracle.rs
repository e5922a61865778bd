//! The two external collaborators of a recovery pass: who proposes the next
//! direction, and who ranks finished candidates.

use tt_core::{Point3, StoppingFlags, StreamlineId, TrackRng};
use tt_criteria::BoxMask;

// ── RolloutSampler ────────────────────────────────────────────────────────────

/// Proposes actions for rollout candidates, usually by sampling the tracking
/// policy stochastically.
///
/// The returned vector is an action, not a displacement: the engine rescales
/// it to the configured step size.  A zero action leaves the candidate in
/// place for that step.
///
/// Implementations must be `Send + Sync`; with the `parallel` feature many
/// candidates sample concurrently, each with its own `rng`.
pub trait RolloutSampler: Send + Sync + 'static {
    fn sample(&self, streamline: StreamlineId, history: &[Point3], rng: &mut TrackRng) -> Point3;
}

/// Persistent random walk: keeps going roughly the way the history was
/// heading, with a random perturbation of relative weight `1 - persistence`.
#[derive(Clone, Debug)]
pub struct RandomWalkSampler {
    pub persistence: f32,
}

impl RolloutSampler for RandomWalkSampler {
    fn sample(&self, _streamline: StreamlineId, history: &[Point3], rng: &mut TrackRng) -> Point3 {
        let jitter = rng.unit_vector();
        let heading = match history {
            [.., a, b] => (*b - *a).scaled_to(1.0),
            _ => return jitter,
        };
        let w = self.persistence.clamp(0.0, 1.0);
        heading * w + jitter * (1.0 - w)
    }
}

// ── RolloutScorer ─────────────────────────────────────────────────────────────

/// A finished rollout candidate as seen by the scorer.
#[derive(Clone, Copy, Debug)]
pub struct CandidateView<'a> {
    /// The streamline being recovered.
    pub streamline: StreamlineId,
    /// Generation order within this streamline's candidates.
    pub candidate:  u32,
    /// Full history: the kept prefix followed by the rolled-out points.
    pub points:     &'a [Point3],
    /// Where the rolled-out part begins in `points`.
    pub branch_at:  usize,
    /// Empty if the candidate reached the horizon without stopping.
    pub flags:      StoppingFlags,
}

impl CandidateView<'_> {
    #[inline]
    pub fn stopped(&self) -> bool {
        !self.flags.is_empty()
    }
}

/// Ranks candidates; higher is better.  NaN ranks below every number.
pub trait RolloutScorer: Send + Sync + 'static {
    fn score(&self, candidate: &CandidateView<'_>) -> f32;
}

/// Prefers the longest candidate, and among equal lengths one that did not
/// stop.
#[derive(Clone, Copy, Debug, Default)]
pub struct PathLengthScorer;

impl RolloutScorer for PathLengthScorer {
    fn score(&self, candidate: &CandidateView<'_>) -> f32 {
        candidate.points.len() as f32 + if candidate.stopped() { 0.0 } else { 0.5 }
    }
}

/// Prefers candidates whose last kept point sits deepest inside a box mask
/// (distance to the nearest boundary).  Points that trimming will drop are
/// not counted.
#[derive(Clone, Debug)]
pub struct BoundaryDistanceScorer {
    pub mask: BoxMask,
}

impl RolloutScorer for BoundaryDistanceScorer {
    fn score(&self, candidate: &CandidateView<'_>) -> f32 {
        let kept = if candidate.flags.trims_last_point() && candidate.points.len() > 1 {
            &candidate.points[..candidate.points.len() - 1]
        } else {
            candidate.points
        };
        kept.last().map_or(0.0, |&p| self.mask.depth(p))
    }
}
