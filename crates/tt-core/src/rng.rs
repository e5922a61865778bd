//! Deterministic RNG streams for seeding and rollout sampling.
//!
//! # Determinism strategy
//!
//! Every random decision is drawn from a `SmallRng` whose seed is mixed from
//! the run's global seed and the identifiers of the thing being decided:
//!
//!   seed = global_seed XOR (a * MIXING_CONSTANT) XOR rotl(b * MIXING_CONSTANT, 21) …
//!
//! The mixing constant is the 64-bit fractional part of the golden ratio.
//! Every stream is keyed by the batch as well as the step, so successive
//! batches of one environment draw fresh selections and candidates.
//! Rollout candidates get their own stream keyed by
//! `(batch, step, streamline, candidate)`, so the result of a recovery pass
//! does not depend on how Rayon schedules the candidates.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::{Point3, StreamlineId};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

#[inline]
fn mix(parts: &[u64]) -> u64 {
    parts.iter().enumerate().fold(0, |acc, (i, &p)| {
        acc ^ p.wrapping_add(1).wrapping_mul(MIXING_CONSTANT).rotate_left(21 * i as u32)
    })
}

/// A deterministic random stream.
///
/// Not `Sync`: each worker owns the stream for the candidate it is rolling
/// out.
pub struct TrackRng(SmallRng);

impl TrackRng {
    pub fn new(seed: u64) -> Self {
        TrackRng(SmallRng::seed_from_u64(seed))
    }

    /// Stream for a single rollout candidate.
    pub fn for_candidate(
        global_seed: u64,
        batch:       u64,
        step:        u64,
        streamline:  StreamlineId,
        candidate:   u32,
    ) -> Self {
        let seed = global_seed ^ mix(&[batch, step, streamline.0 as u64, candidate as u64]);
        TrackRng(SmallRng::seed_from_u64(seed))
    }

    /// Stream for per-step decisions that are not tied to one candidate
    /// (e.g. whether a stopping streamline is eligible for recovery).
    /// Steps are 1-based; step 0 is the batch's reset.
    pub fn for_step(global_seed: u64, batch: u64, step: u64) -> Self {
        let seed = global_seed ^ mix(&[batch, step, u64::MAX]);
        TrackRng(SmallRng::seed_from_u64(seed))
    }

    /// Generate a value uniformly in `range`.
    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Uniformly distributed direction on the unit sphere.
    pub fn unit_vector(&mut self) -> Point3 {
        // Rejection sampling inside the unit ball, then project.
        loop {
            let p = Point3::new(
                self.0.gen_range(-1.0f32..=1.0),
                self.0.gen_range(-1.0f32..=1.0),
                self.0.gen_range(-1.0f32..=1.0),
            );
            let n2 = p.dot(p);
            if n2 > 1e-6 && n2 <= 1.0 {
                return p * (1.0 / n2.sqrt());
            }
        }
    }

    /// Pick `n` indices from `0..pool`.
    ///
    /// Draws without replacement when `n <= pool`; with replacement
    /// otherwise, so small seed pools can still fill a large batch.
    pub fn sample_indices(&mut self, pool: usize, n: usize) -> Vec<usize> {
        if pool == 0 {
            return Vec::new();
        }
        if n <= pool {
            rand::seq::index::sample(&mut self.0, pool, n).into_vec()
        } else {
            (0..n).map(|_| self.0.gen_range(0..pool)).collect()
        }
    }
}
