use thiserror::Error;
use tt_buffer::BufferError;
use tt_criteria::CriterionError;

#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("rollout configuration error: {0}")]
    Config(String),

    #[error("{what} length {got} does not match stopping count {expected}")]
    CountMismatch {
        expected: usize,
        got:      usize,
        what:     &'static str,
    },

    #[error(transparent)]
    Criterion(#[from] CriterionError),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

pub type RolloutResult<T> = Result<T, RolloutError>;
