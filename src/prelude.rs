//! Re-exports the types most callers need.
//!
//! # Example
//! ```rust,no_run
//! use tripwire::prelude::*;
//! ```

pub use crate::breaker::{Action, CircuitBreaker};
pub use crate::config::BreakerConfig;
pub use crate::error::{BreakerError, BreakerResult};
pub use crate::state::State;
