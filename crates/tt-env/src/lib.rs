//! `tt-env`: the tracking environment of the rust_tt streamline tracker.
//!
//! # Batch lifecycle
//!
//! ```text
//! state = env.reset()
//! loop:
//!   ① Advance   StepIntegrator moves every active streamline by its
//!               (rescaled) action.
//!   ② Evaluate  StoppingEvaluator ORs the fired criterion bits.
//!   ③ Recover   if rollouts are due, RolloutEngine tries to rescue the
//!               stopping streamlines (backtrack, branch, score, commit).
//!   ④ Finish    streamlines that still stop are marked done with their
//!               terminal flags.
//!   env.harvest(state)  → new active set = survivors ++ recovered
//! until state.is_finished()
//! tractogram = env.finalize(&state, options)
//! ```
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                 |
//! |------------|--------------------------------------------------------|
//! | `parallel` | Runs rollout candidates on Rayon's thread pool.        |
//! | `serde`    | Serde derives on `Tractogram` and `ExportOptions`.     |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use tt_core::TrackingConfig;
//! use tt_env::{EnvBuilder, ExportOptions, HeadPosition, NoopObserver};
//!
//! let env = EnvBuilder::new(TrackingConfig::default(), seeds, HeadPosition).build()?;
//! let mut state = env.reset()?;
//! while !state.is_finished() {
//!     let actions = policy(&env.states(&state));
//!     env.step(&mut state, &actions, &mut NoopObserver)?;
//!     env.harvest(&mut state, &mut NoopObserver)?;
//! }
//! let tractogram = env.finalize(&state, ExportOptions::default());
//! ```

pub mod builder;
pub mod env;
pub mod error;
pub mod formatter;
pub mod harvest;
pub mod observer;
pub mod state;

#[cfg(test)]
mod tests;

pub use builder::EnvBuilder;
pub use env::TrackingEnv;
pub use error::{EnvError, EnvResult};
pub use formatter::{HeadPosition, RecentDirections, StateFormatter};
pub use harvest::{
    ExportOptions, ExportedStreamline, Harvest, MinPoints, PathLengthRange, RejectFlags, Space,
    StepOutput, StreamlineFilter, Tractogram, TractogramSink,
};
pub use observer::{EnvObserver, NoopObserver};
pub use state::TrackingState;
