//! Integration tests for tt-env.

use tt_core::{Affine, Point3, SeedSelection, StoppingFlags, StreamlineId, TrackRng, TrackingConfig};
use tt_criteria::{BoxMask, MaxCurvature, PredicateError, StoppingCriterion};
use tt_rollout::{
    CandidateView, PathLengthScorer, RandomWalkSampler, RolloutReport, RolloutSampler,
    RolloutScorer,
};

use crate::{
    EnvBuilder, EnvError, EnvObserver, ExportOptions, HeadPosition, NoopObserver, Space,
    TrackingEnv, TrackingState,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn p(x: f32, y: f32, z: f32) -> Point3 {
    Point3::new(x, y, z)
}

fn test_config(max_nb_steps: u32) -> TrackingConfig {
    TrackingConfig {
        max_nb_steps,
        step_size: 1.0,
        rng_seed: 42,
        ..TrackingConfig::default()
    }
}

/// Config for the backtrack-and-rollout tests.
fn rollout_config(max_nb_steps: u32, roll_n_steps: u32) -> TrackingConfig {
    TrackingConfig {
        do_rollout: true,
        roll_n_steps,
        n_rollouts: 3,
        rollout_horizon: 2,
        backtrack_steps: 2,
        rollout_trigger_probability: 1.0,
        ..test_config(max_nb_steps)
    }
}

/// Streamlines leave this box once x exceeds 3.5.
fn x_mask() -> BoxMask {
    BoxMask::new(p(-100.0, -100.0, -100.0), p(3.5, 100.0, 100.0)).unwrap()
}

/// Stops once x reaches `at`.
struct XAtLeast {
    at:   f32,
    flag: StoppingFlags,
}

impl StoppingCriterion for XAtLeast {
    fn flag(&self) -> StoppingFlags {
        self.flag
    }

    fn is_stopping(&self, streamline: &[Point3]) -> Result<bool, PredicateError> {
        Ok(streamline.last().is_some_and(|q| q.x >= self.at))
    }
}

struct Constant(Point3);
impl RolloutSampler for Constant {
    fn sample(&self, _s: StreamlineId, _h: &[Point3], _rng: &mut TrackRng) -> Point3 {
        self.0
    }
}

/// Net x displacement of the rolled-out part.
struct NetX;
impl RolloutScorer for NetX {
    fn score(&self, c: &CandidateView<'_>) -> f32 {
        c.points.last().map_or(0.0, |q| q.x - c.points[c.branch_at - 1].x)
    }
}

/// Steps every active streamline by `action` and harvests, `n` times.
fn run_steps<F: crate::StateFormatter>(
    env:    &TrackingEnv<F>,
    state:  &mut TrackingState,
    action: Point3,
    n:      usize,
) {
    for _ in 0..n {
        let actions = vec![action; state.active().len()];
        env.step(state, &actions, &mut NoopObserver).unwrap();
        env.harvest(state, &mut NoopObserver).unwrap();
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod builder_tests {
    use super::*;

    #[test]
    fn adds_length_limit_by_default() {
        let env = EnvBuilder::new(test_config(5), vec![Point3::ZERO], HeadPosition).build().unwrap();
        assert!(env.evaluator().reports(StoppingFlags::LENGTH));
        let bare = EnvBuilder::new(test_config(5), vec![Point3::ZERO], HeadPosition)
            .without_length_limit()
            .build()
            .unwrap();
        assert!(bare.evaluator().is_empty());
    }

    #[test]
    fn empty_seed_pool_errors() {
        let result = EnvBuilder::new(test_config(5), vec![], HeadPosition).build();
        assert!(matches!(result, Err(EnvError::Config(_))));
    }

    #[test]
    fn non_finite_seed_errors() {
        let result = EnvBuilder::new(test_config(5), vec![p(f32::NAN, 0.0, 0.0)], HeadPosition).build();
        assert!(matches!(result, Err(EnvError::Config(_))));
    }

    #[test]
    fn rollout_without_oracles_errors() {
        let result = EnvBuilder::new(rollout_config(5, 1), vec![Point3::ZERO], HeadPosition).build();
        assert!(matches!(result, Err(EnvError::Config(_))));
    }

    #[test]
    fn invalid_config_errors() {
        let mut config = test_config(5);
        config.step_size = 0.0;
        let result = EnvBuilder::new(config, vec![Point3::ZERO], HeadPosition).build();
        assert!(matches!(result, Err(EnvError::Core(_))));
    }

    #[test]
    fn multi_bit_criterion_errors() {
        let result = EnvBuilder::new(test_config(5), vec![Point3::ZERO], HeadPosition)
            .criterion(XAtLeast { at: 1.0, flag: StoppingFlags::MASK | StoppingFlags::LOOP })
            .build();
        assert!(matches!(result, Err(EnvError::Criterion(_))));
    }
}

// ── Reset ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod reset {
    use super::*;

    fn pool(n: usize) -> Vec<Point3> {
        (0..n).map(|i| p(i as f32, 0.0, 0.0)).collect()
    }

    #[test]
    fn range_selects_slice_of_pool() {
        let env = EnvBuilder::new(test_config(4), pool(10), HeadPosition).build().unwrap();
        let state = env.reset_with(&SeedSelection::Range { start: 2, end: 5 }).unwrap();
        let buf = state.buffer();
        assert_eq!(buf.count, 3);
        assert_eq!(buf.capacity(), 5);
        assert_eq!(buf.seeds, vec![p(2.0, 0.0, 0.0), p(3.0, 0.0, 0.0), p(4.0, 0.0, 0.0)]);
        assert_eq!(buf.seed_ids[0].index(), 2);
        assert_eq!(state.active().len(), 3);
        assert_eq!(state.step_count(), 0);
        assert_eq!(env.states(&state), buf.seeds);
    }

    #[test]
    fn default_selection_takes_whole_pool() {
        let env = EnvBuilder::new(test_config(4), pool(7), HeadPosition).build().unwrap();
        assert_eq!(env.reset().unwrap().buffer().count, 7);
    }

    #[test]
    fn empty_selection_errors() {
        let env = EnvBuilder::new(test_config(4), pool(10), HeadPosition).build().unwrap();
        assert!(matches!(
            env.reset_with(&SeedSelection::Range { start: 5, end: 5 }),
            Err(EnvError::Config(_))
        ));
        assert!(matches!(
            env.reset_with(&SeedSelection::Range { start: 11, end: 20 }),
            Err(EnvError::Core(_))
        ));
    }

    #[test]
    fn sampling_is_reproducible_per_env() {
        let draw = || {
            let env = EnvBuilder::new(test_config(4), pool(100), HeadPosition).build().unwrap();
            let a = env.reset_with(&SeedSelection::Sample { n: 10 }).unwrap().buffer().seed_ids.clone();
            let b = env.reset_with(&SeedSelection::Sample { n: 10 }).unwrap().buffer().seed_ids.clone();
            (a, b)
        };
        let (a1, b1) = draw();
        let (a2, b2) = draw();
        assert_eq!(a1, a2);
        assert_eq!(b1, b2);
        assert_ne!(a1, b1);
        // Without replacement while the pool is large enough.
        let mut sorted = a1.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 10);
    }
}

// ── Step ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod step {
    use super::*;

    /// 3 seeds, max 5 steps, no recovery, +x actions, stop at x ≥ 3.
    #[test]
    fn stops_on_target_and_keeps_last_point() {
        let seeds = vec![p(0.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(0.0, 2.0, 0.0)];
        let env = EnvBuilder::new(test_config(5), seeds, HeadPosition)
            .criterion(XAtLeast { at: 3.0, flag: StoppingFlags::TARGET })
            .build()
            .unwrap();
        let mut state = env.reset().unwrap();

        for step in 1..=3 {
            let out = env.step(&mut state, &[p(1.0, 0.0, 0.0); 3], &mut NoopObserver).unwrap();
            assert_eq!(out.dones, vec![step == 3; 3]);
            env.harvest(&mut state, &mut NoopObserver).unwrap();
        }

        assert!(state.is_finished());
        assert_eq!(state.buffer().lengths, vec![4, 4, 4]);
        assert_eq!(state.buffer().flags, vec![StoppingFlags::TARGET; 3]);
        assert_eq!(state.buffer().flags[0].bits(), 0x1);
        let t = env.finalize(&state, ExportOptions::default());
        assert!(t.streamlines.iter().all(|s| s.points.len() == 4));
        assert_eq!(t.streamlines[1].points[3], p(3.0, 1.0, 0.0));
    }

    #[test]
    fn actions_are_rescaled_to_step_size() {
        let mut config = test_config(5);
        config.step_size = 0.5;
        let env = EnvBuilder::new(config, vec![Point3::ZERO, Point3::ZERO], HeadPosition).build().unwrap();
        let mut state = env.reset().unwrap();
        let out = env
            .step(&mut state, &[p(3.0, 4.0, 0.0), Point3::ZERO], &mut NoopObserver)
            .unwrap();
        assert!((out.states[0] - p(0.3, 0.4, 0.0)).norm() < 1e-6);
        // A zero action leaves the streamline in place but still counts.
        assert_eq!(out.states[1], Point3::ZERO);
        assert_eq!(state.buffer().lengths, vec![2, 2]);
    }

    #[test]
    fn stops_on_length_limit() {
        let env = EnvBuilder::new(test_config(3), vec![Point3::ZERO], HeadPosition).build().unwrap();
        let mut state = env.reset().unwrap();
        run_steps(&env, &mut state, p(0.0, 0.0, 1.0), 3);
        assert!(state.is_finished());
        assert_eq!(state.flags_of(StreamlineId(0)), StoppingFlags::LENGTH);
        assert_eq!(state.buffer().len_of(StreamlineId(0)), 4);
    }

    #[test]
    fn action_count_mismatch_leaves_state_alone() {
        let env = EnvBuilder::new(test_config(5), vec![Point3::ZERO; 2], HeadPosition).build().unwrap();
        let mut state = env.reset().unwrap();
        let err = env.step(&mut state, &[p(1.0, 0.0, 0.0)], &mut NoopObserver);
        assert!(matches!(err, Err(EnvError::CountMismatch { expected: 2, got: 1, .. })));
        assert_eq!(state.step_count(), 0);
        assert_eq!(state.buffer().lengths, vec![1, 1]);
        assert!(!state.has_pending_harvest());
    }

    #[test]
    fn criterion_failure_rolls_the_step_back() {
        struct Broken;
        impl StoppingCriterion for Broken {
            fn flag(&self) -> StoppingFlags {
                StoppingFlags::LOOP
            }
            fn is_stopping(&self, s: &[Point3]) -> Result<bool, PredicateError> {
                if s.len() > 2 { Err("lookup failed".into()) } else { Ok(false) }
            }
        }
        let env = EnvBuilder::new(test_config(5), vec![Point3::ZERO; 2], HeadPosition)
            .criterion(Broken)
            .build()
            .unwrap();
        let mut state = env.reset().unwrap();
        run_steps(&env, &mut state, p(1.0, 0.0, 0.0), 1);

        let err = env.step(&mut state, &[p(1.0, 0.0, 0.0); 2], &mut NoopObserver);
        assert!(matches!(err, Err(EnvError::Criterion(_))));
        assert_eq!(state.step_count(), 1);
        assert_eq!(state.buffer().lengths, vec![2, 2]);
        assert_eq!(state.active_count(), 2);
        assert!(!state.has_pending_harvest());
    }

    #[test]
    fn step_before_harvest_errors() {
        let env = EnvBuilder::new(test_config(5), vec![Point3::ZERO], HeadPosition).build().unwrap();
        let mut state = env.reset().unwrap();
        env.step(&mut state, &[p(1.0, 0.0, 0.0)], &mut NoopObserver).unwrap();
        assert!(matches!(
            env.step(&mut state, &[p(1.0, 0.0, 0.0)], &mut NoopObserver),
            Err(EnvError::HarvestPending)
        ));
        assert_eq!(state.buffer().lengths, vec![2]);
    }

    #[test]
    fn observer_sees_steps_and_harvests() {
        #[derive(Default)]
        struct Counter {
            steps:    usize,
            stopped:  usize,
            harvests: usize,
        }
        impl EnvObserver for Counter {
            fn on_step_end(&mut self, _step: u64, _stepped: usize, stopped: usize) {
                self.steps += 1;
                self.stopped += stopped;
            }
            fn on_harvest(&mut self, _step: u64, _active: usize, _finished: usize) {
                self.harvests += 1;
            }
        }
        let env = EnvBuilder::new(test_config(2), vec![Point3::ZERO; 3], HeadPosition).build().unwrap();
        let mut state = env.reset().unwrap();
        let mut obs = Counter::default();
        while !state.is_finished() {
            let actions = vec![p(1.0, 0.0, 0.0); state.active().len()];
            env.step(&mut state, &actions, &mut obs).unwrap();
            env.harvest(&mut state, &mut obs).unwrap();
        }
        assert_eq!(obs.steps, 2);
        assert_eq!(obs.harvests, 2);
        assert_eq!(obs.stopped, 3);
    }
}

// ── Harvest ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod harvest {
    use super::*;

    #[test]
    fn survivors_keep_order_and_continuation_aligns() {
        let seeds = vec![p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(-5.0, 0.0, 0.0), p(2.5, 0.0, 0.0)];
        let env = EnvBuilder::new(test_config(10), seeds, HeadPosition)
            .criterion(XAtLeast { at: 3.0, flag: StoppingFlags::TARGET })
            .build()
            .unwrap();
        let mut state = env.reset().unwrap();
        env.step(&mut state, &[p(1.0, 0.0, 0.0); 4], &mut NoopObserver).unwrap();
        let h = env.harvest(&mut state, &mut NoopObserver).unwrap();

        assert_eq!(h.continuation, vec![true, false, true, false]);
        assert_eq!(state.active(), &[StreamlineId(0), StreamlineId(2)]);
        assert_eq!(h.states, vec![p(1.0, 0.0, 0.0), p(-4.0, 0.0, 0.0)]);
        assert_eq!(state.active_count() + state.finished_count(), 4);
    }

    #[test]
    fn harvest_without_step_errors() {
        let env = EnvBuilder::new(test_config(5), vec![Point3::ZERO], HeadPosition).build().unwrap();
        let mut state = env.reset().unwrap();
        assert!(matches!(
            env.harvest(&mut state, &mut NoopObserver),
            Err(EnvError::NothingToHarvest)
        ));
        run_steps(&env, &mut state, p(1.0, 0.0, 0.0), 1);
        assert!(matches!(
            env.harvest(&mut state, &mut NoopObserver),
            Err(EnvError::NothingToHarvest)
        ));
    }
}

// ── Rollout ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod rollout {
    use super::*;

    fn single_seed_env(sampler: impl RolloutSampler, roll_n_steps: u32) -> TrackingEnv<HeadPosition> {
        EnvBuilder::new(rollout_config(10, roll_n_steps), vec![Point3::ZERO], HeadPosition)
            .criterion(x_mask())
            .rollout(sampler, NetX)
            .build()
            .unwrap()
    }

    #[test]
    fn recovered_streamline_rejoins_active_set() {
        #[derive(Default)]
        struct Rollouts(Vec<(u64, usize)>);
        impl EnvObserver for Rollouts {
            fn on_rollout(&mut self, step: u64, report: &RolloutReport) {
                self.0.push((step, report.recovered.len()));
            }
        }

        let env = single_seed_env(Constant(p(0.0, 1.0, 0.0)), 4);
        let mut state = env.reset().unwrap();
        let mut obs = Rollouts::default();
        run_steps(&env, &mut state, p(1.0, 0.0, 0.0), 3);

        // Step 4 leaves the mask at x = 4 and triggers recovery.
        let out = env.step(&mut state, &[p(1.0, 0.0, 0.0)], &mut obs).unwrap();
        assert_eq!(out.dones, vec![false]);
        assert_eq!(out.flags, vec![StoppingFlags::empty()]);
        assert_eq!(out.states, vec![p(2.0, 2.0, 0.0)]);
        assert_eq!(obs.0, vec![(4, 1)]);

        // It stopped this step, so the mask says so; it still rejoins.
        let h = env.harvest(&mut state, &mut obs).unwrap();
        assert_eq!(h.continuation, vec![false]);
        assert_eq!(state.active(), &[StreamlineId(0)]);
        assert_eq!(state.buffer().len_of(StreamlineId(0)), 5);

        // And it keeps tracking from the recovered head.
        let out = env.step(&mut state, &[p(1.0, 0.0, 0.0)], &mut obs).unwrap();
        assert_eq!(out.states, vec![p(3.0, 2.0, 0.0)]);
    }

    #[test]
    fn exhausted_streamline_stops_with_winner_flags() {
        let env = single_seed_env(Constant(p(1.0, 0.0, 0.0)), 4);
        let mut state = env.reset().unwrap();
        run_steps(&env, &mut state, p(1.0, 0.0, 0.0), 4);

        assert!(state.is_finished());
        assert_eq!(state.flags_of(StreamlineId(0)), StoppingFlags::MASK);
        let t = env.finalize(&state, ExportOptions::default());
        // Five points tracked, the one outside the mask trimmed.
        assert_eq!(t.streamlines[0].points.len(), 4);
        assert_eq!(t.streamlines[0].points.last(), Some(&p(3.0, 0.0, 0.0)));
    }

    #[test]
    fn no_pass_off_schedule() {
        let env = single_seed_env(Constant(p(0.0, 1.0, 0.0)), 3);
        let mut state = env.reset().unwrap();
        run_steps(&env, &mut state, p(1.0, 0.0, 0.0), 4);
        assert!(state.is_finished());
        assert_eq!(state.flags_of(StreamlineId(0)), StoppingFlags::MASK);
    }

    #[test]
    fn disabled_in_config_means_no_pass() {
        let mut config = rollout_config(10, 1);
        config.do_rollout = false;
        let env = EnvBuilder::new(config, vec![Point3::ZERO], HeadPosition)
            .criterion(x_mask())
            .rollout(Constant(p(0.0, 1.0, 0.0)), NetX)
            .build()
            .unwrap();
        assert!(!env.rollout_enabled());
        let mut state = env.reset().unwrap();
        run_steps(&env, &mut state, p(1.0, 0.0, 0.0), 4);
        assert!(state.is_finished());
    }

    #[test]
    fn growth_keeps_other_rows_and_seed_mapping() {
        let config = TrackingConfig {
            n_rollouts: 2,
            rollout_horizon: 5,
            backtrack_steps: 1,
            ..rollout_config(3, 1)
        };
        let seeds = vec![p(0.0, 0.0, 0.0), p(-10.0, 0.0, 0.0)];
        let env = EnvBuilder::new(config, seeds, HeadPosition)
            .criterion(XAtLeast { at: 3.0, flag: StoppingFlags::MASK })
            .rollout(Constant(p(0.0, 1.0, 0.0)), NetX)
            .without_length_limit()
            .build()
            .unwrap();
        let mut state = env.reset().unwrap();
        run_steps(&env, &mut state, p(1.0, 0.0, 0.0), 2);
        let before: Vec<u32> = state
            .buffer()
            .streamline(StreamlineId(1))
            .iter()
            .flat_map(|q| [q.x.to_bits(), q.y.to_bits(), q.z.to_bits()])
            .collect();
        let seed_ids = state.buffer().seed_ids.clone();

        // Third step fills the row of streamline 0 and stops it at x = 3.
        env.step(&mut state, &[p(1.0, 0.0, 0.0); 2], &mut NoopObserver).unwrap();
        env.harvest(&mut state, &mut NoopObserver).unwrap();

        let buf = state.buffer();
        assert_eq!(buf.capacity(), 9);
        assert_eq!(buf.len_of(StreamlineId(0)), 8);
        let after: Vec<u32> = buf.streamline(StreamlineId(1))[..3]
            .iter()
            .flat_map(|q| [q.x.to_bits(), q.y.to_bits(), q.z.to_bits()])
            .collect();
        assert_eq!(after, before);
        assert_eq!(buf.seed_ids, seed_ids);
        // Survivors first, then the recovered streamline.
        assert_eq!(state.active(), &[StreamlineId(1), StreamlineId(0)]);
        run_steps(&env, &mut state, p(1.0, 0.0, 0.0), 1);
    }

    #[test]
    fn successive_batches_draw_fresh_selections() {
        #[derive(Default)]
        struct Selected(Vec<bool>);
        impl EnvObserver for Selected {
            fn on_rollout(&mut self, _step: u64, report: &RolloutReport) {
                self.0 = report
                    .outcomes
                    .iter()
                    .map(|o| !matches!(o, tt_rollout::RolloutOutcome::Skipped))
                    .collect();
            }
        }

        let build = || {
            let config = TrackingConfig {
                rollout_trigger_probability: 0.5,
                ..rollout_config(10, 1)
            };
            let seeds = (0..32).map(|i| p(0.0, i as f32, 0.0)).collect();
            EnvBuilder::new(config, seeds, HeadPosition)
                .criterion(XAtLeast { at: 1.0, flag: StoppingFlags::MASK })
                .rollout(Constant(p(1.0, 0.0, 0.0)), NetX)
                .build()
                .unwrap()
        };
        // Every streamline stops on the first step, so all 32 are candidates.
        let first_step = |env: &TrackingEnv<HeadPosition>| {
            let mut state = env.reset().unwrap();
            let mut obs = Selected::default();
            env.step(&mut state, &[p(1.0, 0.0, 0.0); 32], &mut obs).unwrap();
            (state.batch(), obs.0)
        };

        let env = build();
        let batches: Vec<(u64, Vec<bool>)> = (0..3).map(|_| first_step(&env)).collect();
        assert_eq!(batches.iter().map(|b| b.0).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(batches[0].1.contains(&true) && batches[0].1.contains(&false));
        assert_ne!(batches[0].1, batches[1].1);
        assert_ne!(batches[1].1, batches[2].1);

        // A fresh env replays the same sequence.
        assert_eq!(first_step(&build()), batches[0]);
    }
}

// ── Whole-run properties ──────────────────────────────────────────────────────

#[cfg(test)]
mod properties {
    use std::sync::{Arc, Mutex};

    use tt_criteria::MaxLength;

    use super::*;

    type FireLog = Arc<Mutex<Vec<(Point3, StoppingFlags)>>>;

    /// Logs `(seed, bit)` every time the wrapped criterion fires.
    struct Recording<C> {
        inner: C,
        log:   FireLog,
    }

    impl<C: StoppingCriterion> StoppingCriterion for Recording<C> {
        fn flag(&self) -> StoppingFlags {
            self.inner.flag()
        }

        fn is_stopping(&self, streamline: &[Point3]) -> Result<bool, PredicateError> {
            let fired = self.inner.is_stopping(streamline)?;
            if let (true, Some(&seed)) = (fired, streamline.first()) {
                self.log.lock().unwrap().push((seed, self.flag()));
            }
            Ok(fired)
        }
    }

    fn noisy_env() -> TrackingEnv<HeadPosition> {
        noisy_env_recording(&FireLog::default())
    }

    /// Same criteria the builder would set up, including its length limit,
    /// each wrapped in `Recording`.
    fn noisy_env_recording(log: &FireLog) -> TrackingEnv<HeadPosition> {
        let config = TrackingConfig {
            max_nb_steps: 30,
            step_size: 0.8,
            do_rollout: true,
            roll_n_steps: 2,
            n_rollouts: 4,
            rollout_horizon: 3,
            backtrack_steps: 2,
            rollout_trigger_probability: 0.5,
            rng_seed: 9,
            ..TrackingConfig::default()
        };
        let seeds = (0..20).map(|i| p((i % 5) as f32, (i / 5) as f32, 0.0)).collect();
        EnvBuilder::new(config, seeds, HeadPosition)
            .without_length_limit()
            .criterion(Recording {
                inner: BoxMask::new(p(-6.0, -6.0, -6.0), p(10.0, 10.0, 6.0)).unwrap(),
                log:   log.clone(),
            })
            .criterion(Recording { inner: MaxCurvature::new(75.0).unwrap(), log: log.clone() })
            .criterion(Recording { inner: MaxLength::new(31).unwrap(), log: log.clone() })
            .rollout(RandomWalkSampler { persistence: 0.7 }, PathLengthScorer)
            .affine(Affine::scale_translate(2.0, p(1.0, 1.0, 1.0)))
            .filter(crate::MinPoints(5))
            .build()
            .unwrap()
    }

    fn run_to_end(env: &TrackingEnv<HeadPosition>) -> TrackingState {
        let mut state = env.reset().unwrap();
        let mut rng = TrackRng::new(3);
        let mut guard = 0;
        while !state.is_finished() {
            let actions: Vec<Point3> = state.active().iter().map(|_| rng.unit_vector()).collect();
            env.step(&mut state, &actions, &mut NoopObserver).unwrap();
            env.harvest(&mut state, &mut NoopObserver).unwrap();

            let mut ids = state.active().to_vec();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), state.active().len(), "streamline counted twice");
            assert!(state.active().iter().all(|id| !state.buffer().dones[id.index()]));
            assert_eq!(state.active().len() + state.finished_count(), 20);

            guard += 1;
            assert!(guard < 500, "tracking did not terminate");
        }
        state
    }

    #[test]
    fn terminal_flags_come_from_criteria_that_fired() {
        let log = FireLog::default();
        let env = noisy_env_recording(&log);
        let state = run_to_end(&env);
        let fired = log.lock().unwrap();
        let buf = state.buffer();
        for id in buf.ids() {
            let flags = buf.flags[id.index()];
            assert!(!flags.is_empty(), "{id:?} finished without flags");
            let seed = buf.streamline(id)[0];
            for bit in flags.iter() {
                assert!(fired.contains(&(seed, bit)), "{bit:?} on {id:?} never fired for its seed");
            }
        }
    }

    #[test]
    fn trimming_law_holds() {
        let env = noisy_env();
        let state = run_to_end(&env);
        let t = env.finalize(&state, ExportOptions::default());
        assert_eq!(t.len(), 20);
        for s in &t.streamlines {
            let len = state.buffer().len_of(s.id);
            let expected = if s.flags.intersects(StoppingFlags::CURVATURE | StoppingFlags::MASK) {
                len - 1
            } else {
                len
            };
            assert_eq!(s.points.len(), expected);
            assert_eq!(s.points[0], s.seed);
        }
    }

    #[test]
    fn finalize_is_idempotent() {
        let env = noisy_env();
        let state = run_to_end(&env);
        let opts = ExportOptions { space: Space::World, filter: true };
        assert_eq!(env.finalize(&state, opts), env.finalize(&state, opts));
    }

    #[test]
    fn runs_are_deterministic() {
        let a = run_to_end(&noisy_env());
        let b = run_to_end(&noisy_env());
        let env = noisy_env();
        assert_eq!(
            env.finalize(&a, ExportOptions::default()),
            env.finalize(&b, ExportOptions::default())
        );
    }

    #[test]
    fn world_space_and_filters() {
        let env = noisy_env();
        let state = run_to_end(&env);
        let voxel = env.finalize(&state, ExportOptions::default());
        let world = env.finalize(&state, ExportOptions { space: Space::World, filter: false });
        for (v, w) in voxel.streamlines.iter().zip(&world.streamlines) {
            assert_eq!(w.seed, env.affine().apply(v.seed));
            assert_eq!(w.points[0], p(2.0 * v.points[0].x + 1.0, 2.0 * v.points[0].y + 1.0, 1.0));
        }
        let filtered = env.finalize(&state, ExportOptions { space: Space::Voxel, filter: true });
        assert!(filtered.streamlines.iter().all(|s| s.points.len() >= 5));
        let short = voxel.streamlines.iter().filter(|s| s.points.len() < 5).count();
        assert_eq!(filtered.len() + short, voxel.len());
    }
}

// ── Export ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod export {
    use super::*;
    use crate::{ExportedStreamline, RecentDirections, StateFormatter, TractogramSink};

    #[test]
    fn sink_receives_every_streamline() {
        #[derive(Default)]
        struct Collect {
            began:    Option<usize>,
            points:   usize,
            finished: bool,
        }
        impl TractogramSink for Collect {
            type Error = std::convert::Infallible;
            fn begin(&mut self, _s: Space, _a: &Affine, count: usize) -> Result<(), Self::Error> {
                self.began = Some(count);
                Ok(())
            }
            fn write(&mut self, s: &ExportedStreamline) -> Result<(), Self::Error> {
                self.points += s.points.len();
                Ok(())
            }
            fn finish(&mut self) -> Result<(), Self::Error> {
                self.finished = true;
                Ok(())
            }
        }

        let env = EnvBuilder::new(test_config(3), vec![Point3::ZERO; 4], HeadPosition).build().unwrap();
        let mut state = env.reset().unwrap();
        run_steps(&env, &mut state, p(1.0, 0.0, 0.0), 3);
        let t = env.finalize(&state, ExportOptions::default());
        let mut sink = Collect::default();
        t.write_to(&mut sink).unwrap();
        assert_eq!(sink.began, Some(4));
        assert_eq!(sink.points, t.total_points());
        assert_eq!(sink.points, 16);
        assert!(sink.finished);
    }

    #[test]
    fn unfinished_streamlines_export_untrimmed() {
        let env = EnvBuilder::new(test_config(10), vec![Point3::ZERO], HeadPosition).build().unwrap();
        let mut state = env.reset().unwrap();
        run_steps(&env, &mut state, p(1.0, 0.0, 0.0), 2);
        let s = env.export_one(&state, StreamlineId(0), Space::Voxel).unwrap();
        assert_eq!(s.points.len(), 3);
        assert!(s.flags.is_empty());
        assert!(matches!(
            env.export_one(&state, StreamlineId(1), Space::Voxel),
            Err(EnvError::InvalidIndex(_))
        ));
    }

    #[test]
    fn single_point_streamline_is_not_trimmed_away() {
        // A mask the seed is already outside of: first step stops on MASK.
        let env = EnvBuilder::new(test_config(5), vec![p(50.0, 0.0, 0.0)], HeadPosition)
            .criterion(x_mask())
            .build()
            .unwrap();
        let mut state = env.reset().unwrap();
        run_steps(&env, &mut state, Point3::ZERO, 1);
        let t = env.finalize(&state, ExportOptions::default());
        assert_eq!(t.streamlines[0].points, vec![p(50.0, 0.0, 0.0)]);
    }

    #[test]
    fn recent_directions_pads_with_zeros() {
        let f = RecentDirections { n: 3 };
        let state = f.format(StreamlineId(0), &[p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(2.0, 3.0, 0.0)]);
        assert_eq!(
            state,
            vec![2.0, 3.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        );
    }
}
