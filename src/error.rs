//! Error types for the circuit breaker library.

use thiserror::Error;

use crate::state::State;

/// Result type for circuit breaker operations.
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;

/// Error returned by [`CircuitBreaker::fire`](crate::CircuitBreaker::fire).
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open and the action was not invoked.
    #[error("Circuit breaker is open")]
    Open,

    /// The action ran and failed.
    #[error("Operation error ({state}): {source}")]
    Operation {
        /// The error produced by the action, unchanged.
        #[source]
        source: E,
        /// State the call was admitted under.
        state: State,
    },
}

impl<E> BreakerError<E> {
    /// Returns true if the call was rejected without reaching the action.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open)
    }

    /// The action's error, if the action ran.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            BreakerError::Open => None,
            BreakerError::Operation { source, .. } => Some(source),
        }
    }

    /// Consumes the error, yielding the action's error if the action ran.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            BreakerError::Open => None,
            BreakerError::Operation { source, .. } => Some(source),
        }
    }

    /// State the failed call was admitted under; `Open` for rejections.
    pub fn state(&self) -> State {
        match self {
            BreakerError::Open => State::Open,
            BreakerError::Operation { state, .. } => *state,
        }
    }
}

/// Invalid breaker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `failure_threshold` was zero.
    #[error("failure threshold must be at least 1")]
    ZeroFailureThreshold,

    /// `success_threshold` was zero.
    #[error("success threshold must be at least 1")]
    ZeroSuccessThreshold,
}
