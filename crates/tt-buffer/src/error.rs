use thiserror::Error;
use tt_core::StreamlineId;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("streamline {streamline} would exceed its capacity of {capacity} points")]
    CapacityExceeded {
        streamline: StreamlineId,
        capacity:   usize,
    },

    #[error("streamline {0} is out of range or already finished")]
    InvalidIndex(StreamlineId),

    #[error("{what} length {got} does not match expected {expected}")]
    CountMismatch {
        expected: usize,
        got:      usize,
        what:     &'static str,
    },

    #[error("buffer configuration error: {0}")]
    Config(String),
}

pub type BufferResult<T> = Result<T, BufferError>;
