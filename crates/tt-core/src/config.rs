//! Tracking configuration.
//!
//! Typically deserialized from a TOML/JSON file by the application (enable
//! the `serde` feature) and handed to the environment builder.

use crate::{CoreError, CoreResult, SeedId, TrackRng};

// ── SeedSelection ─────────────────────────────────────────────────────────────

/// Which seeds of the pool form a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SeedSelection {
    /// The contiguous slice `start..end` of the seed pool.  `end` is clamped
    /// to the pool size.
    Range { start: usize, end: usize },
    /// `n` seeds drawn at random.  Seeds repeat only when `n` exceeds the
    /// pool.
    Sample { n: usize },
}

impl SeedSelection {
    /// Resolve to concrete seed ids for a pool of `pool` seeds.
    pub fn resolve(&self, pool: usize, rng: &mut TrackRng) -> CoreResult<Vec<SeedId>> {
        let to_id = |i: usize| {
            SeedId::try_from(i).map_err(|_| CoreError::SeedOutOfRange { seed: SeedId::INVALID, pool })
        };
        match *self {
            SeedSelection::Range { start, end } => {
                let end = end.min(pool);
                if start > end {
                    return Err(CoreError::SeedOutOfRange {
                        seed: SeedId::try_from(start).unwrap_or(SeedId::INVALID),
                        pool,
                    });
                }
                (start..end).map(to_id).collect()
            }
            SeedSelection::Sample { n } => {
                if pool == 0 && n > 0 {
                    return Err(CoreError::Config("cannot sample seeds from an empty pool".into()));
                }
                rng.sample_indices(pool, n).into_iter().map(to_id).collect()
            }
        }
    }
}

impl Default for SeedSelection {
    fn default() -> Self {
        SeedSelection::Range { start: 0, end: usize::MAX }
    }
}

// ── TrackingConfig ────────────────────────────────────────────────────────────

/// Top-level tracking configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackingConfig {
    /// Seeds forming one batch.
    pub seeds: SeedSelection,

    /// Step budget per streamline.  The buffer is allocated with
    /// `max_nb_steps + 1` points per row (seed included).
    pub max_nb_steps: u32,

    /// Length of one tracking step, in voxels.  Actions are rescaled to it.
    pub step_size: f32,

    /// Enable backtrack-and-rollout recovery of stopping streamlines.
    pub do_rollout: bool,

    /// Recovery runs only on steps whose count is a multiple of this.
    pub roll_n_steps: u32,

    /// Candidates generated per recovered streamline.
    pub n_rollouts: u32,

    /// Maximum number of steps each candidate is rolled out for.
    pub rollout_horizon: u32,

    /// How many points are discarded before branching.
    pub backtrack_steps: u32,

    /// Probability that a stopping streamline is put through recovery when
    /// a recovery pass runs.
    pub rollout_trigger_probability: f64,

    /// Master RNG seed.  The same seed always produces identical results.
    pub rng_seed: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            seeds:                       SeedSelection::default(),
            max_nb_steps:                256,
            step_size:                   0.75,
            do_rollout:                  false,
            roll_n_steps:                1,
            n_rollouts:                  5,
            rollout_horizon:             10,
            backtrack_steps:             5,
            rollout_trigger_probability: 0.1,
            rng_seed:                    1337,
        }
    }
}

impl TrackingConfig {
    /// Points per buffer row at allocation time.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.max_nb_steps as usize + 1
    }

    /// Reject configurations the environment cannot run.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_nb_steps == 0 {
            return Err(CoreError::Config("max_nb_steps must be at least 1".into()));
        }
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(CoreError::Config(format!(
                "step_size must be a positive finite number, got {}",
                self.step_size
            )));
        }
        if !(0.0..=1.0).contains(&self.rollout_trigger_probability) {
            return Err(CoreError::Config(format!(
                "rollout_trigger_probability must lie in [0, 1], got {}",
                self.rollout_trigger_probability
            )));
        }
        if self.do_rollout {
            if self.roll_n_steps == 0 {
                return Err(CoreError::Config("roll_n_steps must be at least 1".into()));
            }
            if self.n_rollouts == 0 {
                return Err(CoreError::Config("n_rollouts must be at least 1".into()));
            }
            if self.rollout_horizon == 0 {
                return Err(CoreError::Config("rollout_horizon must be at least 1".into()));
            }
        }
        Ok(())
    }
}
