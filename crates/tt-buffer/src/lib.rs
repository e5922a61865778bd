//! `tt-buffer`: Structure-of-Arrays streamline storage for `rust_tt`.
//!
//! # Crate layout
//!
//! | Module           | Contents                                                   |
//! |------------------|------------------------------------------------------------|
//! | [`store`]        | `StreamlineBuffer` (dense points + per-streamline SoA)     |
//! | [`integrator`]   | `StepIntegrator`: append one step to every active row      |
//! | [`error`]        | `BufferError`, `BufferResult<T>`                           |

pub mod error;
pub mod integrator;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::{BufferError, BufferResult};
pub use integrator::StepIntegrator;
pub use store::StreamlineBuffer;
