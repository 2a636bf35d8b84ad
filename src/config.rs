//! Configuration for circuit breakers.

use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::clock::{Clock, SystemClock};
use crate::error::ConfigError;
use crate::hook::HookRegistry;

/// Default number of failures that trips a closed circuit.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Default success threshold; the circuit closes once probes exceed it.
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;

/// Default time a tripped circuit stays open.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Thresholds and timing for a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Failures counted while closed before the circuit opens.
    pub failure_threshold: u32,

    /// The circuit closes once successful probes exceed this count, so
    /// `success_threshold + 1` successes are needed to recover.
    pub success_threshold: u32,

    /// How long the circuit stays open before admitting a probe.
    ///
    /// This does not bound how long a single call to the action may run.
    pub timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl BreakerConfig {
    /// Checks that both thresholds are positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::ZeroSuccessThreshold);
        }
        Ok(())
    }
}

/// Builder for creating circuit breakers with custom configurations.
pub struct BreakerBuilder<A, C = SystemClock> {
    action: A,
    config: BreakerConfig,
    clock: C,
    hooks: HookRegistry,
}

impl<A> BreakerBuilder<A, SystemClock> {
    /// Creates a new builder with default settings around `action`.
    pub fn new(action: A) -> Self {
        Self {
            action,
            config: BreakerConfig::default(),
            clock: SystemClock,
            hooks: HookRegistry::new(),
        }
    }
}

impl<A, C> BreakerBuilder<A, C>
where
    C: Clock,
{
    /// Sets the number of failures that trips the circuit.
    pub fn failure_threshold(mut self, count: u32) -> Self {
        self.config.failure_threshold = count;
        self
    }

    /// Sets the success threshold a half-open circuit must exceed to close.
    pub fn success_threshold(mut self, count: u32) -> Self {
        self.config.success_threshold = count;
        self
    }

    /// Sets how long the circuit stays open before admitting a probe.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.config.timeout = duration;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: BreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a hook registry for the circuit breaker.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Changes the time source.
    pub fn clock<NewC: Clock>(self, clock: NewC) -> BreakerBuilder<A, NewC> {
        BreakerBuilder {
            action: self.action,
            config: self.config,
            clock,
            hooks: self.hooks,
        }
    }

    /// Builds the circuit breaker, rejecting invalid thresholds.
    pub fn build(self) -> Result<CircuitBreaker<A, C>, ConfigError> {
        CircuitBreaker::from_parts(self.action, self.config, self.clock, self.hooks)
    }
}
