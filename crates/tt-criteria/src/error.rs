use thiserror::Error;
use tt_buffer::BufferError;
use tt_core::StreamlineId;

use crate::PredicateError;

#[derive(Debug, Error)]
pub enum CriterionError {
    #[error("stopping criterion `{criterion}` failed on streamline {streamline}: {source}")]
    Failed {
        criterion:  String,
        streamline: StreamlineId,
        #[source]
        source:     PredicateError,
    },

    #[error("stopping criterion `{criterion}` must own exactly one flag bit, got {bits:#x}")]
    InvalidFlag { criterion: String, bits: u32 },

    #[error("criterion configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

pub type CriterionResult<T> = Result<T, CriterionError>;
