use thiserror::Error;
use tt_buffer::BufferError;
use tt_core::{CoreError, StreamlineId};
use tt_criteria::CriterionError;
use tt_rollout::RolloutError;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("environment configuration error: {0}")]
    Config(String),

    #[error("streamline {0} does not exist in this batch")]
    InvalidIndex(StreamlineId),

    #[error("{what} length {got} does not match active count {expected}")]
    CountMismatch {
        expected: usize,
        got:      usize,
        what:     &'static str,
    },

    #[error("the previous step has not been harvested yet")]
    HarvestPending,

    #[error("nothing to harvest: no step since the last harvest")]
    NothingToHarvest,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Criterion(#[from] CriterionError),

    #[error(transparent)]
    Rollout(#[from] RolloutError),
}

pub type EnvResult<T> = Result<T, EnvError>;
