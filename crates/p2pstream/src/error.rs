use thiserror::Error;

use crate::gateway::Timeout;
use crate::state::{Operation, StreamState};
use crate::status::StatusCode;

/// Errors from stream controller operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The operation is not legal from the current state. No driver call
    /// was made.
    #[error("cannot {operation} while stream is {state}")]
    InvalidTransition {
        operation: Operation,
        state: StreamState,
    },

    /// The driver returned a negative status. `state` is where the
    /// lifecycle stood when the failing call was issued.
    #[error("{operation} failed with driver status {code} (stream was {state})")]
    Fatal {
        operation: Operation,
        code: StatusCode,
        state: StreamState,
    },

    /// The flush did not drain before the timeout. The stream may still
    /// have been disabled.
    #[error("flush did not complete within {timeout}")]
    FlushTimedOut { timeout: Timeout },
}

impl StreamError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StreamError::Fatal { .. })
    }

    pub fn code(&self) -> Option<StatusCode> {
        match self {
            StreamError::Fatal { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T, E = StreamError> = std::result::Result<T, E>;
