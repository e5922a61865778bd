//! The `TrackingEnv` struct and its reset/step/harvest/finalize cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{debug, info};
use tt_buffer::{StepIntegrator, StreamlineBuffer};
use tt_core::{Affine, Point3, SeedSelection, StoppingFlags, StreamlineId, TrackRng, TrackingConfig};
use tt_criteria::StoppingEvaluator;
use tt_rollout::RolloutEngine;

use crate::harvest::export_streamline;
use crate::state::PendingHarvest;
use crate::{
    EnvError, EnvObserver, EnvResult, ExportOptions, ExportedStreamline, Harvest, Space,
    StateFormatter, StepOutput, StreamlineFilter, Tractogram, TrackingState,
};

/// The tracking environment.
///
/// Holds everything shared by all batches (config, seed pool, criteria,
/// rollout engine, export settings) and drives one batch at a time through
/// its [`TrackingState`]:
///
/// 1. **reset**: pick seeds, allocate the buffer, everything active.
/// 2. **step** (repeated): advance every active streamline by its action,
///    evaluate the stopping criteria, and if a recovery pass is due try to
///    rescue the stopping ones.  Stopped streamlines are finished here.
/// 3. **harvest** (after every step): install the new active set.
/// 4. **finalize**: export all streamlines, trimmed, optionally mapped to
///    world space and filtered.
///
/// Create via [`EnvBuilder`][crate::EnvBuilder].
pub struct TrackingEnv<F: StateFormatter> {
    pub(crate) config:    TrackingConfig,
    pub(crate) seed_pool: Vec<Point3>,
    pub(crate) formatter: F,
    pub(crate) evaluator: StoppingEvaluator,
    pub(crate) rollout:   Option<RolloutEngine>,
    pub(crate) affine:    Affine,
    pub(crate) filters:   Vec<Box<dyn StreamlineFilter>>,
    /// Number of batches handed out; keys the seed-sampling stream.
    pub(crate) resets:    AtomicU64,
}

impl<F: StateFormatter> TrackingEnv<F> {
    // ── Accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    #[inline]
    pub fn evaluator(&self) -> &StoppingEvaluator {
        &self.evaluator
    }

    #[inline]
    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    #[inline]
    pub fn seed_pool(&self) -> &[Point3] {
        &self.seed_pool
    }

    /// `true` if a rollout engine is attached and the config enables it.
    #[inline]
    pub fn rollout_enabled(&self) -> bool {
        self.config.do_rollout && self.rollout.is_some()
    }

    // ── Reset ─────────────────────────────────────────────────────────────

    /// Start a batch with the seeds chosen by `config.seeds`.
    pub fn reset(&self) -> EnvResult<TrackingState> {
        self.reset_with(&self.config.seeds)
    }

    /// Start a batch with an explicit seed selection.
    ///
    /// `Sample` draws differ between successive resets of the same
    /// environment but the sequence is fixed by `rng_seed`.
    pub fn reset_with(&self, selection: &SeedSelection) -> EnvResult<TrackingState> {
        let batch = self.resets.fetch_add(1, Ordering::Relaxed);
        // Complemented seed keeps batch draws apart from rollout selection.
        let mut rng = TrackRng::for_step(!self.config.rng_seed, batch, 0);
        let seed_ids = selection.resolve(self.seed_pool.len(), &mut rng)?;
        if seed_ids.is_empty() {
            return Err(EnvError::Config(format!("seed selection {selection:?} is empty")));
        }

        let seeds: Vec<Point3> = seed_ids.iter().map(|s| self.seed_pool[s.index()]).collect();
        let buffer = StreamlineBuffer::new(&seeds, seed_ids, self.config.capacity())?;
        debug!(batch, streamlines = buffer.count, capacity = buffer.capacity(), "reset");
        Ok(TrackingState::new(buffer, batch))
    }

    /// Formatted states of the current active set, in its order.
    pub fn states(&self, state: &TrackingState) -> Vec<F::State> {
        state
            .active
            .iter()
            .map(|&id| self.formatter.format(id, state.buffer.streamline(id)))
            .collect()
    }

    // ── Step ──────────────────────────────────────────────────────────────

    /// Advance every active streamline by its action and decide who stops.
    ///
    /// `actions` is aligned to [`TrackingState::active`].  Each action is
    /// rescaled to `step_size`; a zero action leaves the streamline in place.
    ///
    /// On error nothing is committed: the advance is undone and the step
    /// count is unchanged.
    pub fn step<O: EnvObserver>(
        &self,
        state:    &mut TrackingState,
        actions:  &[Point3],
        observer: &mut O,
    ) -> EnvResult<StepOutput<F::State>> {
        if state.pending.is_some() {
            return Err(EnvError::HarvestPending);
        }
        let active = state.active.clone();
        if actions.len() != active.len() {
            return Err(EnvError::CountMismatch {
                expected: active.len(),
                got:      actions.len(),
                what:     "actions",
            });
        }
        let step = state.step + 1;

        // ── Advance ───────────────────────────────────────────────────────
        let directions: Vec<Point3> =
            actions.iter().map(|a| a.scaled_to(self.config.step_size)).collect();
        StepIntegrator.advance(&mut state.buffer, &active, &directions)?;

        // ── Evaluate ──────────────────────────────────────────────────────
        let decision = match self.evaluator.evaluate(&state.buffer, &active) {
            Ok(d) => d,
            Err(e) => {
                StepIntegrator.retract(&mut state.buffer, &active);
                return Err(e.into());
            }
        };
        let (survivors, stopping) = decision.partition(&active);
        let continuation: Vec<bool> = decision.stopping.iter().map(|s| !s).collect();
        let stop_flags: Vec<StoppingFlags> =
            decision.flags.iter().copied().filter(|f| !f.is_empty()).collect();

        // ── Recover ───────────────────────────────────────────────────────
        let (recovered, finished, finished_flags) = match self.due_engine(step, stopping.len()) {
            Some(engine) => {
                let started = Instant::now();
                let report = match engine.recover(
                    &mut state.buffer,
                    &self.evaluator,
                    state.batch,
                    step,
                    &stopping,
                    &stop_flags,
                ) {
                    Ok(r) => r,
                    Err(e) => {
                        StepIntegrator.retract(&mut state.buffer, &active);
                        return Err(e.into());
                    }
                };
                info!(
                    batch = state.batch,
                    step,
                    stopping = stopping.len(),
                    recovered = report.recovered.len(),
                    candidates = report.candidates_run,
                    elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
                    "rollout pass"
                );
                observer.on_rollout(step, &report);
                (report.recovered, report.stopped, report.stopped_flags)
            }
            None => (Vec::new(), stopping, stop_flags),
        };

        // ── Finish ────────────────────────────────────────────────────────
        for (&id, &flags) in finished.iter().zip(&finished_flags) {
            state.buffer.finish(id, flags)?;
        }

        // ── Report ────────────────────────────────────────────────────────
        let buffer = &state.buffer;
        let dones: Vec<bool> = active.iter().map(|id| buffer.dones[id.index()]).collect();
        let flags = active.iter().map(|id| buffer.flags[id.index()]).collect();
        let states = active
            .iter()
            .map(|&id| self.formatter.format(id, buffer.streamline(id)))
            .collect();

        let mut next_active = survivors;
        next_active.extend_from_slice(&recovered);
        state.pending = Some(PendingHarvest {
            next_active,
            continuation,
        });
        state.step = step;

        debug!(
            step,
            stepped = active.len(),
            stopped = finished.len(),
            recovered = recovered.len(),
            "step"
        );
        observer.on_step_end(step, active.len(), finished.len());

        Ok(StepOutput { states, dones, flags, active })
    }

    fn due_engine(&self, step: u64, stopping: usize) -> Option<&RolloutEngine> {
        if !self.config.do_rollout {
            return None;
        }
        self.rollout.as_ref().filter(|e| e.is_due(step, stopping))
    }

    // ── Harvest ───────────────────────────────────────────────────────────

    /// Install the active set computed by the last `step`: survivors in
    /// their previous order, then recovered streamlines.
    pub fn harvest<O: EnvObserver>(
        &self,
        state:    &mut TrackingState,
        observer: &mut O,
    ) -> EnvResult<Harvest<F::State>> {
        let pending = state.pending.take().ok_or(EnvError::NothingToHarvest)?;
        state.active = pending.next_active;
        let states = self.states(state);
        observer.on_harvest(state.step, state.active.len(), state.finished_count());
        Ok(Harvest { states, continuation: pending.continuation })
    }

    // ── Finalize ──────────────────────────────────────────────────────────

    /// Export every streamline of the batch in buffer order.
    ///
    /// Does not modify `state`; calling it twice gives the same tractogram.
    pub fn finalize(&self, state: &TrackingState, options: ExportOptions) -> Tractogram {
        let total = state.buffer.count;
        let streamlines: Vec<ExportedStreamline> = state
            .buffer
            .ids()
            .map(|id| self.to_space(export_streamline(&state.buffer, id), options.space))
            .filter(|s| !options.filter || self.filters.iter().all(|f| f.keep(s)))
            .collect();
        debug!(exported = streamlines.len(), dropped = total - streamlines.len(), "finalize");
        Tractogram { space: options.space, affine: self.affine, streamlines }
    }

    /// Export a single streamline, unfiltered.
    pub fn export_one(
        &self,
        state: &TrackingState,
        id:    StreamlineId,
        space: Space,
    ) -> EnvResult<ExportedStreamline> {
        if id.index() >= state.buffer.count {
            return Err(EnvError::InvalidIndex(id));
        }
        Ok(self.to_space(export_streamline(&state.buffer, id), space))
    }

    fn to_space(&self, mut s: ExportedStreamline, space: Space) -> ExportedStreamline {
        if space == Space::World {
            for p in &mut s.points {
                *p = self.affine.apply(*p);
            }
            s.seed = self.affine.apply(s.seed);
        }
        s
    }
}
