//! # tripwire
//!
//! An asynchronous circuit breaker that guards a single fallible operation.
//!
//! The breaker is bound to its action at construction and gates every call
//! through [`CircuitBreaker::fire`]. It moves through three states:
//!
//! - **Closed**: calls reach the action. Failures are counted, and a success
//!   clears the count. Reaching `failure_threshold` opens the circuit.
//! - **Open**: calls are rejected immediately with [`BreakerError::Open`]
//!   until `timeout` has elapsed since the circuit opened.
//! - **Half-Open**: the first call after the timeout becomes a probe. Any
//!   probe failure reopens the circuit; more than `success_threshold`
//!   successful probes close it.
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::fmt;
//! use std::time::Duration;
//! use tripwire::{BreakerError, CircuitBreaker};
//!
//! #[derive(Debug)]
//! struct ServiceError(String);
//!
//! impl fmt::Display for ServiceError {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         write!(f, "Service error: {}", self.0)
//!     }
//! }
//!
//! impl std::error::Error for ServiceError {}
//!
//! async fn lookup(id: u32) -> Result<String, ServiceError> {
//!     Ok(format!("user-{id}"))
//! }
//!
//! # tokio_test::block_on(async {
//! let breaker = CircuitBreaker::builder(lookup)
//!     .failure_threshold(3)
//!     .success_threshold(2)
//!     .timeout(Duration::from_secs(5))
//!     .build()?;
//!
//! match breaker.fire(7u32).await {
//!     Ok(user) => println!("Call succeeded: {}", user),
//!     Err(BreakerError::Open) => println!("Circuit is open, call was prevented"),
//!     Err(err) => println!("Call failed: {}", err),
//! }
//! # Ok::<(), tripwire::ConfigError>(())
//! # });
//! ```
//!
//! ## Concurrency
//!
//! State transitions happen under a short-lived lock that is never held
//! across the action's await point, so concurrent callers cannot lose
//! counter updates. More than one probe may reach the action while the
//! circuit is half-open.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod breaker;
mod clock;
mod config;
mod error;
mod hook;
pub mod prelude;
mod state;

// Re-exports
pub use breaker::{Action, CircuitBreaker};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BreakerBuilder, BreakerConfig, DEFAULT_FAILURE_THRESHOLD, DEFAULT_SUCCESS_THRESHOLD,
    DEFAULT_TIMEOUT,
};
pub use error::{BreakerError, BreakerResult, ConfigError};
pub use hook::HookRegistry;
pub use state::{BreakerSnapshot, State};
