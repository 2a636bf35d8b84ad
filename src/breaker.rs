//! Core circuit breaker implementation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{BreakerBuilder, BreakerConfig};
use crate::error::{BreakerError, BreakerResult, ConfigError};
use crate::hook::HookRegistry;
use crate::state::{Admission, BreakerSnapshot, State, StateMachine, StateManager, Transition};

/// An asynchronous operation guarded by a circuit breaker.
///
/// Implemented for every `Fn(Args) -> Future<Output = Result<T, E>>`. Several
/// arguments are passed as a tuple, none as `()`.
pub trait Action<Args> {
    /// Value produced on success.
    type Output;

    /// Error produced on failure.
    type Error;

    /// Future returned by [`Action::invoke`].
    type Future: Future<Output = Result<Self::Output, Self::Error>>;

    /// Starts one attempt of the operation.
    fn invoke(&self, args: Args) -> Self::Future;
}

impl<F, Fut, Args, T, E> Action<Args> for F
where
    F: Fn(Args) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    type Output = T;
    type Error = E;
    type Future = Fut;

    fn invoke(&self, args: Args) -> Self::Future {
        self(args)
    }
}

/// Inner state of the circuit breaker, shared between clones.
struct BreakerInner<A, C> {
    action: A,
    clock: C,
    config: BreakerConfig,
    state_manager: StateManager,
    hooks: HookRegistry,
}

/// A circuit breaker bound to one asynchronous action.
///
/// Cloning is cheap; clones share the action and the state machine.
pub struct CircuitBreaker<A, C = SystemClock> {
    inner: Arc<BreakerInner<A, C>>,
}

impl<A> CircuitBreaker<A, SystemClock> {
    /// Creates a circuit breaker around `action` using the system clock.
    pub fn new(action: A, config: BreakerConfig) -> Result<Self, ConfigError> {
        Self::from_parts(action, config, SystemClock, HookRegistry::new())
    }

    /// Creates a new builder for customizing a circuit breaker.
    pub fn builder(action: A) -> BreakerBuilder<A, SystemClock> {
        BreakerBuilder::new(action)
    }
}

impl<A, C> CircuitBreaker<A, C>
where
    C: Clock,
{
    /// Creates a circuit breaker that reads time from `clock`.
    pub fn with_clock(action: A, config: BreakerConfig, clock: C) -> Result<Self, ConfigError> {
        Self::from_parts(action, config, clock, HookRegistry::new())
    }

    pub(crate) fn from_parts(
        action: A,
        config: BreakerConfig,
        clock: C,
        hooks: HookRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let machine = StateMachine::new(
            clock.now(),
            config.failure_threshold,
            config.success_threshold,
            config.timeout,
        );

        let inner = BreakerInner {
            action,
            clock,
            config,
            state_manager: StateManager::new(machine),
            hooks,
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Gets the current state of the circuit breaker.
    ///
    /// An open circuit whose timeout has elapsed still reports `Open` until
    /// the next call moves it to half-open.
    pub fn state(&self) -> State {
        self.inner.state_manager.current()
    }

    /// Gets a consistent view of the counters and the probe deadline.
    pub fn snapshot(&self) -> BreakerSnapshot {
        self.inner.state_manager.snapshot()
    }

    /// Gets the hook registry, so hooks can be registered after building.
    pub fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    /// Gets the configuration the breaker was built with.
    pub fn config(&self) -> &BreakerConfig {
        &self.inner.config
    }

    /// Invokes the action through the circuit breaker.
    ///
    /// Fails with [`BreakerError::Open`] without touching the action while
    /// the circuit is open, and with [`BreakerError::Operation`] carrying the
    /// action's own error when the attempt fails.
    pub async fn fire<Args>(&self, args: Args) -> BreakerResult<A::Output, A::Error>
    where
        A: Action<Args>,
    {
        let Some(admitted) = self.pre_call() else {
            return Err(BreakerError::Open);
        };

        let result = self.inner.action.invoke(args).await;

        self.post_call(result.is_ok(), admitted);

        result.map_err(|source| BreakerError::Operation {
            source,
            state: admitted.state,
        })
    }

    /// Checks if a call is allowed, returning its admission ticket.
    fn pre_call(&self) -> Option<Admission> {
        let now = self.inner.clock.now();
        let acquired = self
            .inner
            .state_manager
            .update(|machine| machine.try_acquire(now));

        match acquired {
            Ok((admission, transition)) => {
                if let Some(transition) = transition {
                    self.on_transition(transition);
                }
                Some(admission)
            }
            Err(_) => {
                tracing::trace!("circuit breaker rejected call while open");
                self.inner.hooks.execute_rejected_hook();
                None
            }
        }
    }

    /// Records the outcome of a call and applies any resulting transition.
    fn post_call(&self, success: bool, admitted: Admission) {
        let transition = if success {
            self.inner
                .state_manager
                .update(|machine| machine.on_success(admitted))
        } else {
            let now = self.inner.clock.now();
            self.inner
                .state_manager
                .update(|machine| machine.on_failure(admitted, now))
        };

        // Hooks run outside the lock path.
        if success {
            self.inner.hooks.execute_success_hook();
        } else {
            tracing::debug!(state = %admitted.state, "guarded operation failed");
            self.inner.hooks.execute_failure_hook();
        }

        if let Some(transition) = transition {
            self.on_transition(transition);
        }
    }

    fn on_transition(&self, transition: Transition) {
        tracing::debug!(
            from = %transition.from,
            to = %transition.to,
            "circuit breaker state transition"
        );
        self.inner
            .hooks
            .execute_state_transition_hook(transition.to);
    }
}

// Cheap: the inner state is Arc'd, so no bound on the action is needed.
impl<A, C> Clone for CircuitBreaker<A, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, C> fmt::Debug for CircuitBreaker<A, C>
where
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.inner.config)
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}
