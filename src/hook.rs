//! Hook registry for circuit breaker events.

use crate::state::State;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

type HookFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// A registry for circuit breaker event hooks.
///
/// Hooks observe the breaker; they run after its internal lock is released
/// and have no way to change its state.
pub struct HookRegistry {
    on_open: RwLock<Option<HookFn>>,
    on_close: RwLock<Option<HookFn>>,
    on_half_open: RwLock<Option<HookFn>>,
    on_success: RwLock<Option<HookFn>>,
    on_failure: RwLock<Option<HookFn>>,
    on_rejected: RwLock<Option<HookFn>>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("on_open", &self.on_open.read().is_some())
            .field("on_close", &self.on_close.read().is_some())
            .field("on_half_open", &self.on_half_open.read().is_some())
            .field("on_success", &self.on_success.read().is_some())
            .field("on_failure", &self.on_failure.read().is_some())
            .field("on_rejected", &self.on_rejected.read().is_some())
            .finish()
    }
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self {
            on_open: RwLock::new(None),
            on_close: RwLock::new(None),
            on_half_open: RwLock::new(None),
            on_success: RwLock::new(None),
            on_failure: RwLock::new(None),
            on_rejected: RwLock::new(None),
        }
    }

    /// Sets the hook to call when the circuit breaker opens.
    pub fn set_on_open<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_open.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when the circuit breaker closes.
    pub fn set_on_close<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_close.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when the circuit breaker half-opens.
    pub fn set_on_half_open<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_half_open.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when the action succeeds.
    pub fn set_on_success<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_success.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when the action fails.
    pub fn set_on_failure<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_failure.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when a call is rejected by an open circuit.
    pub fn set_on_rejected<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_rejected.write() = Some(Arc::new(f));
    }

    pub(crate) fn execute_state_transition_hook(&self, to: State) {
        let slot = match to {
            State::Open => &self.on_open,
            State::Closed => &self.on_close,
            State::HalfOpen => &self.on_half_open,
        };
        Self::run(slot);
    }

    pub(crate) fn execute_success_hook(&self) {
        Self::run(&self.on_success);
    }

    pub(crate) fn execute_failure_hook(&self) {
        Self::run(&self.on_failure);
    }

    pub(crate) fn execute_rejected_hook(&self) {
        Self::run(&self.on_rejected);
    }

    // Clone the hook out so a hook that re-registers itself can't deadlock.
    fn run(slot: &RwLock<Option<HookFn>>) {
        let hook = slot.read().clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}
