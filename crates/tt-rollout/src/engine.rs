//! The recovery engine: backtrack, branch, score, commit.

use tracing::debug;
use tt_buffer::StreamlineBuffer;
use tt_core::{StoppingFlags, StreamlineId, TrackRng, TrackingConfig};
use tt_criteria::StoppingEvaluator;

use crate::{
    CandidateView, RolloutError, RolloutResult, RolloutSampler, RolloutScorer, ScratchArena,
    ScratchSlot,
};

// ── Settings ──────────────────────────────────────────────────────────────────

/// The subset of [`TrackingConfig`] the engine needs.
#[derive(Clone, Debug, PartialEq)]
pub struct RolloutSettings {
    /// Recovery runs only on steps whose count is a multiple of this.
    pub roll_n_steps:        u32,
    /// Candidates per recovered streamline.
    pub n_rollouts:          u32,
    /// Maximum steps per candidate.
    pub rollout_horizon:     u32,
    /// Points discarded before branching.
    pub backtrack_steps:     u32,
    /// Chance that a stopping streamline is put through recovery.
    pub trigger_probability: f64,
    /// Sampled actions are rescaled to this length.
    pub step_size:           f32,
    /// Root of every candidate's RNG stream.
    pub rng_seed:            u64,
}

impl RolloutSettings {
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self {
            roll_n_steps:        config.roll_n_steps,
            n_rollouts:          config.n_rollouts,
            rollout_horizon:     config.rollout_horizon,
            backtrack_steps:     config.backtrack_steps,
            trigger_probability: config.rollout_trigger_probability,
            step_size:           config.step_size,
            rng_seed:            config.rng_seed,
        }
    }

    pub fn validate(&self) -> RolloutResult<()> {
        if self.roll_n_steps == 0 || self.n_rollouts == 0 || self.rollout_horizon == 0 {
            return Err(RolloutError::Config(
                "roll_n_steps, n_rollouts and rollout_horizon must all be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.trigger_probability) {
            return Err(RolloutError::Config(format!(
                "trigger probability must lie in [0, 1], got {}",
                self.trigger_probability
            )));
        }
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(RolloutError::Config(format!(
                "step_size must be positive, got {}",
                self.step_size
            )));
        }
        Ok(())
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

/// What happened to one stopping streamline during a recovery pass.
#[derive(Clone, Debug, PartialEq)]
pub enum RolloutOutcome {
    /// Not drawn for recovery; stops with the flags it was handed in with.
    Skipped,
    /// The winner reached the horizon without stopping and was committed as
    /// a continuing streamline.
    Recovered { candidate: u32, score: f32, length: usize },
    /// Every candidate stopped.  The best one was committed as the final
    /// streamline and its flags replace the ones it stopped with.
    Exhausted { candidate: u32, score: f32, length: usize, flags: StoppingFlags },
}

/// Result of [`RolloutEngine::recover`].
#[derive(Clone, Debug, Default)]
pub struct RolloutReport {
    /// Streamlines that keep going, in input order.
    pub recovered:      Vec<StreamlineId>,
    /// Streamlines that stop, in input order.
    pub stopped:        Vec<StreamlineId>,
    /// Terminal flags for `stopped`, aligned with it.
    pub stopped_flags:  Vec<StoppingFlags>,
    /// One outcome per input streamline, aligned with the input.
    pub outcomes:       Vec<RolloutOutcome>,
    /// Number of candidates rolled out.
    pub candidates_run: usize,
    /// New buffer capacity if the commit had to grow it.
    pub grown_to:       Option<usize>,
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// One streamline selected for recovery.
struct Task {
    id:        StreamlineId,
    /// Length of the kept prefix.
    branch_at: usize,
}

/// Which batch and step a pass belongs to; keys every random stream.
#[derive(Clone, Copy)]
struct Pass {
    batch: u64,
    step:  u64,
}

/// Outcome of a single candidate, kept after its slot borrow ends.
#[derive(Clone, Copy)]
struct CandidateRun {
    len:   usize,
    flags: StoppingFlags,
    score: f32,
}

/// Recovers stopping streamlines by backtracking and trying several
/// stochastic continuations.
pub struct RolloutEngine {
    sampler:  Box<dyn RolloutSampler>,
    scorer:   Box<dyn RolloutScorer>,
    settings: RolloutSettings,
}

impl RolloutEngine {
    pub fn new(
        sampler:  impl RolloutSampler,
        scorer:   impl RolloutScorer,
        settings: RolloutSettings,
    ) -> RolloutResult<Self> {
        Self::from_boxed(Box::new(sampler), Box::new(scorer), settings)
    }

    /// Like [`new`](Self::new) for oracles that are already boxed.
    pub fn from_boxed(
        sampler:  Box<dyn RolloutSampler>,
        scorer:   Box<dyn RolloutScorer>,
        settings: RolloutSettings,
    ) -> RolloutResult<Self> {
        settings.validate()?;
        Ok(Self { sampler, scorer, settings })
    }

    #[inline]
    pub fn settings(&self) -> &RolloutSettings {
        &self.settings
    }

    /// `true` if a pass should run after step number `step` (1-based) in
    /// which `stopping` streamlines stopped.
    #[inline]
    pub fn is_due(&self, step: u64, stopping: usize) -> bool {
        stopping > 0 && step.is_multiple_of(self.settings.roll_n_steps as u64)
    }

    /// Run one recovery pass over `stopping` (all active in `buffer`),
    /// whose stop flags from this step are `flags`.
    ///
    /// `batch` identifies the tracking batch; together with `step` it keys
    /// the selection and candidate streams, so each batch draws afresh.
    ///
    /// Nothing in `buffer` is touched until every candidate has finished;
    /// a criterion error therefore leaves the buffer as it was.  The engine
    /// never marks streamlines done: the caller finishes `report.stopped`
    /// with `report.stopped_flags`.
    pub fn recover(
        &self,
        buffer:    &mut StreamlineBuffer,
        evaluator: &StoppingEvaluator,
        batch:     u64,
        step:      u64,
        stopping:  &[StreamlineId],
        flags:     &[StoppingFlags],
    ) -> RolloutResult<RolloutReport> {
        if flags.len() != stopping.len() {
            return Err(RolloutError::CountMismatch {
                expected: stopping.len(),
                got:      flags.len(),
                what:     "stop flags",
            });
        }
        for &id in stopping {
            buffer.check_active(id)?;
        }

        // ── Select and backtrack ──────────────────────────────────────────
        let pass = Pass { batch, step };
        let mut select_rng = TrackRng::for_step(self.settings.rng_seed, batch, step);
        let selected: Vec<bool> = stopping
            .iter()
            .map(|_| select_rng.gen_bool(self.settings.trigger_probability))
            .collect();

        let backtrack = self.settings.backtrack_steps as usize;
        let tasks: Vec<Task> = stopping
            .iter()
            .zip(&selected)
            .filter(|&(_, &sel)| sel)
            .map(|(&id, _)| Task {
                id,
                branch_at: buffer.len_of(id).saturating_sub(backtrack).max(1),
            })
            .collect();

        // ── Branch and score (independent, possibly parallel) ─────────────
        let n_rollouts = self.settings.n_rollouts as usize;
        let slot_capacity = tasks.iter().map(|t| t.branch_at).max().unwrap_or(0)
            + self.settings.rollout_horizon as usize;
        let mut arena = ScratchArena::new(tasks.len() * n_rollouts, slot_capacity);
        let runs = self.run_candidates(buffer, evaluator, pass, &tasks, &mut arena)?;

        let winners: Vec<usize> = runs.chunks(n_rollouts).map(pick_winner).collect();

        // ── Grow once, before any copy ────────────────────────────────────
        //
        // A continuing winner also needs room for its next step.
        let required = winners
            .iter()
            .enumerate()
            .map(|(t, &w)| {
                let run = &runs[t * n_rollouts + w];
                if run.flags.is_empty() { run.len + 1 } else { run.len }
            })
            .max()
            .unwrap_or(0);
        let mut grown_to = None;
        if required > buffer.capacity() {
            debug!(from = buffer.capacity(), to = required, "growing streamline buffer");
            buffer.grow(required);
            grown_to = Some(required);
        }

        // ── Commit (sequential, single writer) ────────────────────────────
        let mut task_outcomes = Vec::with_capacity(tasks.len());
        for (t, task) in tasks.iter().enumerate() {
            let k = t * n_rollouts + winners[t];
            let run = runs[k];
            buffer.overwrite(task.id, arena.slot(k, run.len))?;
            let candidate = winners[t] as u32;
            task_outcomes.push(if run.flags.is_empty() {
                RolloutOutcome::Recovered { candidate, score: run.score, length: run.len }
            } else {
                RolloutOutcome::Exhausted {
                    candidate,
                    score: run.score,
                    length: run.len,
                    flags: run.flags,
                }
            });
        }

        // ── Assemble the report in input order ────────────────────────────
        let mut report = RolloutReport {
            candidates_run: runs.len(),
            grown_to,
            ..Default::default()
        };
        let mut task_outcomes = task_outcomes.into_iter();
        for ((&id, &orig_flags), &sel) in stopping.iter().zip(flags).zip(&selected) {
            let outcome = if sel {
                task_outcomes.next().unwrap_or(RolloutOutcome::Skipped)
            } else {
                RolloutOutcome::Skipped
            };
            match outcome {
                RolloutOutcome::Recovered { .. } => report.recovered.push(id),
                RolloutOutcome::Exhausted { flags, .. } => {
                    report.stopped.push(id);
                    report.stopped_flags.push(flags);
                }
                RolloutOutcome::Skipped => {
                    report.stopped.push(id);
                    report.stopped_flags.push(orig_flags);
                }
            }
            report.outcomes.push(outcome);
        }

        debug!(
            batch,
            step,
            selected = tasks.len(),
            recovered = report.recovered.len(),
            candidates = report.candidates_run,
            "rollout pass complete"
        );
        Ok(report)
    }

    /// Roll out every (task, candidate) pair into its arena slot.
    fn run_candidates(
        &self,
        buffer:    &StreamlineBuffer,
        evaluator: &StoppingEvaluator,
        pass:      Pass,
        tasks:     &[Task],
        arena:     &mut ScratchArena,
    ) -> RolloutResult<Vec<CandidateRun>> {
        let slots = arena.slots_mut();

        #[cfg(not(feature = "parallel"))]
        {
            slots
                .into_iter()
                .enumerate()
                .map(|(k, slot)| self.run_candidate(k, slot, buffer, evaluator, pass, tasks))
                .collect()
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            slots
                .into_par_iter()
                .enumerate()
                .map(|(k, slot)| self.run_candidate(k, slot, buffer, evaluator, pass, tasks))
                .collect()
        }
    }

    fn run_candidate(
        &self,
        k:         usize,
        mut slot:  ScratchSlot<'_>,
        buffer:    &StreamlineBuffer,
        evaluator: &StoppingEvaluator,
        pass:      Pass,
        tasks:     &[Task],
    ) -> RolloutResult<CandidateRun> {
        let n_rollouts = self.settings.n_rollouts as usize;
        let task = &tasks[k / n_rollouts];
        let candidate = (k % n_rollouts) as u32;

        slot.reset_from(&buffer.streamline(task.id)[..task.branch_at]);
        let mut rng = TrackRng::for_candidate(
            self.settings.rng_seed,
            pass.batch,
            pass.step,
            task.id,
            candidate,
        );

        let mut flags = StoppingFlags::empty();
        for _ in 0..self.settings.rollout_horizon {
            let Some(&head) = slot.history().last() else { break };
            let action = self.sampler.sample(task.id, slot.history(), &mut rng);
            if !slot.push(head + action.scaled_to(self.settings.step_size)) {
                break;
            }
            flags = evaluator.evaluate_one(task.id, slot.history())?;
            if !flags.is_empty() {
                break;
            }
        }

        let view = CandidateView {
            streamline: task.id,
            candidate,
            points: slot.history(),
            branch_at: task.branch_at,
            flags,
        };
        let score = self.scorer.score(&view);
        Ok(CandidateRun { len: slot.len(), flags, score })
    }
}

/// Index of the best-scoring run.  Ties go to the earliest candidate; NaN
/// ranks below every number.
fn pick_winner(runs: &[CandidateRun]) -> usize {
    let rank = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    let mut best = 0;
    let mut best_score = rank(runs[0].score);
    for (i, run) in runs.iter().enumerate().skip(1) {
        let s = rank(run.score);
        if s > best_score {
            best = i;
            best_score = s;
        }
    }
    best
}
