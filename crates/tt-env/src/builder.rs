//! Fluent builder for constructing a [`TrackingEnv`].

use std::sync::atomic::AtomicU64;

use tracing::warn;
use tt_core::{Affine, Point3, StoppingFlags, TrackingConfig};
use tt_criteria::{MaxLength, StoppingCriterion, StoppingEvaluator};
use tt_rollout::{RolloutEngine, RolloutSampler, RolloutScorer, RolloutSettings};

use crate::{EnvError, EnvResult, StateFormatter, StreamlineFilter, TrackingEnv};

/// Fluent builder for [`TrackingEnv<F>`].
///
/// # Required inputs
///
/// - [`TrackingConfig`]: step budget, step size, rollout knobs, seed
/// - the seed pool, in tracking (voxel) coordinates
/// - `F: StateFormatter`: what `step` and `harvest` report per streamline
///
/// # Optional inputs (have defaults)
///
/// | Method                      | Default                                   |
/// |-----------------------------|-------------------------------------------|
/// | `.criterion(c)`             | none besides the length limit             |
/// | `.without_length_limit()`   | `MaxLength(max_nb_steps + 1)` is added    |
/// | `.rollout(sampler, scorer)` | no recovery (required if `do_rollout`)    |
/// | `.affine(a)`                | `Affine::IDENTITY`                        |
/// | `.filter(f)`                | no export filters                         |
///
/// # Example
///
/// ```rust,ignore
/// let env = EnvBuilder::new(config, seeds, HeadPosition)
///     .criterion(BoxMask::new(lo, hi)?)
///     .criterion(MaxCurvature::new(60.0)?)
///     .rollout(RandomWalkSampler { persistence: 0.8 }, PathLengthScorer)
///     .build()?;
/// let mut state = env.reset()?;
/// ```
pub struct EnvBuilder<F: StateFormatter> {
    config:       TrackingConfig,
    seed_pool:    Vec<Point3>,
    formatter:    F,
    criteria:     Vec<Box<dyn StoppingCriterion>>,
    oracles:      Option<(Box<dyn RolloutSampler>, Box<dyn RolloutScorer>)>,
    affine:       Affine,
    filters:      Vec<Box<dyn StreamlineFilter>>,
    length_limit: bool,
}

impl<F: StateFormatter> EnvBuilder<F> {
    /// Create a builder with all required inputs.
    pub fn new(config: TrackingConfig, seed_pool: Vec<Point3>, formatter: F) -> Self {
        Self {
            config,
            seed_pool,
            formatter,
            criteria:     Vec::new(),
            oracles:      None,
            affine:       Affine::IDENTITY,
            filters:      Vec::new(),
            length_limit: true,
        }
    }

    /// Append a stopping criterion.  Criteria are evaluated in the order
    /// they are added.
    pub fn criterion(mut self, criterion: impl StoppingCriterion) -> Self {
        self.criteria.push(Box::new(criterion));
        self
    }

    /// Append an already boxed stopping criterion.
    pub fn boxed_criterion(mut self, criterion: Box<dyn StoppingCriterion>) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Do not add the default `MaxLength` criterion.
    ///
    /// Streamlines are then bounded only by the other criteria, and the
    /// buffer grows whenever a recovered streamline outruns it.
    pub fn without_length_limit(mut self) -> Self {
        self.length_limit = false;
        self
    }

    /// Attach the rollout oracles.  Recovery runs only if the config also
    /// sets `do_rollout`.
    pub fn rollout(mut self, sampler: impl RolloutSampler, scorer: impl RolloutScorer) -> Self {
        self.oracles = Some((Box::new(sampler), Box::new(scorer)));
        self
    }

    /// Voxel → world transform applied by `finalize` with `Space::World`.
    pub fn affine(mut self, affine: Affine) -> Self {
        self.affine = affine;
        self
    }

    /// Append an export filter.
    pub fn filter(mut self, filter: impl StreamlineFilter) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Validate inputs, assemble the evaluator and rollout engine, and return
    /// a ready environment.
    pub fn build(self) -> EnvResult<TrackingEnv<F>> {
        self.config.validate()?;
        if self.seed_pool.is_empty() {
            return Err(EnvError::Config("seed pool is empty".into()));
        }
        if let Some(bad) = self.seed_pool.iter().position(|p| !p.to_array().iter().all(|c| c.is_finite())) {
            return Err(EnvError::Config(format!("seed {bad} has a non-finite coordinate")));
        }

        // ── Stopping criteria ─────────────────────────────────────────────
        let mut evaluator = StoppingEvaluator::new();
        for criterion in self.criteria {
            evaluator.push(criterion)?;
        }
        if self.length_limit {
            evaluator.push(Box::new(MaxLength::new(self.config.capacity())?))?;
        }
        if !evaluator.reports(StoppingFlags::LENGTH) {
            warn!(
                max_nb_steps = self.config.max_nb_steps,
                "no length criterion: streamlines may outgrow max_nb_steps"
            );
        }

        // ── Rollout engine ────────────────────────────────────────────────
        let rollout = match (self.config.do_rollout, self.oracles) {
            (true, None) => {
                return Err(EnvError::Config(
                    "do_rollout is set but no rollout sampler/scorer was attached".into(),
                ));
            }
            (_, Some((sampler, scorer))) => Some(RolloutEngine::from_boxed(
                sampler,
                scorer,
                RolloutSettings::from_config(&self.config),
            )?),
            (false, None) => None,
        };

        Ok(TrackingEnv {
            config:    self.config,
            seed_pool: self.seed_pool,
            formatter: self.formatter,
            evaluator,
            rollout,
            affine:    self.affine,
            filters:   self.filters,
            resets:    AtomicU64::new(0),
        })
    }
}
