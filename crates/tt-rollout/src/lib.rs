//! `tt-rollout`: recovery of streamlines that are about to stop.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                          |
//! |---------------|-------------------------------------------------------------------|
//! | [`oracle`]    | `RolloutSampler`, `RolloutScorer` traits + simple implementations |
//! | [`arena`]     | `ScratchArena`: one private region per (streamline, candidate)    |
//! | [`engine`]    | `RolloutEngine`, `RolloutSettings`, `RolloutReport`               |
//! | [`error`]     | `RolloutError`, `RolloutResult<T>`                                |
//!
//! # Recovery model
//!
//! 1. **Backtrack** each selected streamline by `backtrack_steps` points
//!    (never past its seed).
//! 2. **Branch** `n_rollouts` candidates from that point.  Each candidate
//!    steps with directions from the [`RolloutSampler`] and is re-checked by
//!    the same stopping criteria as the main loop, for up to
//!    `rollout_horizon` steps or until it stops.
//! 3. **Score** every candidate with the [`RolloutScorer`]; the highest
//!    score wins, ties going to the earliest candidate.
//! 4. **Commit** the winner into the shared buffer, growing it first if the
//!    winner does not fit.  A winner that kept going re-enters the active
//!    set; one that stopped becomes the final streamline.
//!
//! Candidates only ever write to their own arena slot.  The commit is the
//! single writer to the buffer and runs sequentially.

pub mod arena;
pub mod engine;
pub mod error;
pub mod oracle;


pub use arena::{ScratchArena, ScratchSlot};
pub use engine::{RolloutEngine, RolloutOutcome, RolloutReport, RolloutSettings};
pub use error::{RolloutError, RolloutResult};
pub use oracle::{
    BoundaryDistanceScorer, CandidateView, PathLengthScorer, RandomWalkSampler, RolloutSampler,
    RolloutScorer,
};
