//! `tt-criteria`: stopping criteria and the batch stopping evaluator.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                        |
//! |-----------------|-----------------------------------------------------------------|
//! | [`criterion`]   | `StoppingCriterion` trait: the extension point for user code    |
//! | [`builtin`]     | `MaxLength`, `MaxCurvature`, `BoxMask`, `TargetSphere`, `Looping` |
//! | [`evaluator`]   | `StoppingEvaluator`, `StopDecision`                             |
//! | [`error`]       | `CriterionError`, `CriterionResult<T>`                          |
//!
//! # Contract
//!
//! A criterion looks at one streamline's full history (seed first, newest
//! point last) and answers "stop now?".  It owns exactly one
//! [`StoppingFlags`][tt_core::StoppingFlags] bit, reported whenever it fires.
//! Criteria must be deterministic: the rollout engine re-evaluates them on
//! speculative histories and expects the same answer the main loop would
//! give.

pub mod builtin;
pub mod criterion;
pub mod error;
pub mod evaluator;


pub use builtin::{BoxMask, Looping, MaxCurvature, MaxLength, TargetSphere};
pub use criterion::{PredicateError, StoppingCriterion};
pub use error::{CriterionError, CriterionResult};
pub use evaluator::{StopDecision, StoppingEvaluator};
