//! Circuit breaker state machine implementation.

use parking_lot::Mutex;
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Represents the possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum State {
    /// Circuit is closed and operations are allowed.
    Closed = 0,

    /// Circuit is open and operations are rejected.
    Open = 1,

    /// Circuit is letting probe operations through to test recovery.
    HalfOpen = 2,
}

impl State {
    /// Short lowercase name, as used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        }
    }
}

impl State {
    // Inverse of `as u8`; only ever fed values written by `StateManager`.
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => State::Open,
            2 => State::HalfOpen,
            _ => State::Closed,
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single edge taken through the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: State,
    pub(crate) to: State,
}

/// Ticket handed to an admitted call.
///
/// `generation` changes on every transition, so an outcome can tell whether
/// the state it was admitted under is still the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Admission {
    pub(crate) state: State,
    generation: u64,
}

/// Marker returned when a call is refused because the circuit is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rejected;

/// Counters and timestamps driving the breaker.
///
/// This is plain bookkeeping with no synchronization; the breaker keeps it
/// behind a lock and only touches it between awaits.
#[derive(Debug, Clone)]
pub(crate) struct StateMachine {
    state: State,
    failure_count: u32,
    success_count: u32,
    opened_at: Instant,
    generation: u64,
    failure_threshold: u32,
    success_threshold: u32,
    timeout: Duration,
}

impl StateMachine {
    pub(crate) fn new(
        now: Instant,
        failure_threshold: u32,
        success_threshold: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            state: State::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: now,
            generation: 0,
            failure_threshold,
            success_threshold,
            timeout,
        }
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub(crate) fn success_count(&self) -> u32 {
        self.success_count
    }

    /// Earliest instant a probe is admitted, while open.
    ///
    /// `None` when the circuit is not open, or when the timeout is too large
    /// to be represented as an `Instant`.
    pub(crate) fn next_attempt_at(&self) -> Option<Instant> {
        match self.state {
            State::Open => self.opened_at.checked_add(self.timeout),
            State::Closed | State::HalfOpen => None,
        }
    }

    /// Decides whether a call may reach the action.
    ///
    /// Returns the admission ticket, plus the transition taken when an expired
    /// open circuit moves to half-open. Counters are left untouched by that
    /// transition.
    pub(crate) fn try_acquire(
        &mut self,
        now: Instant,
    ) -> Result<(Admission, Option<Transition>), Rejected> {
        let transition = match self.state {
            State::Closed | State::HalfOpen => None,
            State::Open => {
                if now.saturating_duration_since(self.opened_at) < self.timeout {
                    return Err(Rejected);
                }
                Some(self.move_to(State::HalfOpen))
            }
        };

        let admission = Admission {
            state: self.state,
            generation: self.generation,
        };
        Ok((admission, transition))
    }

    /// Records a successful call.
    ///
    /// Successes from calls admitted under an earlier state are ignored.
    pub(crate) fn on_success(&mut self, admission: Admission) -> Option<Transition> {
        if !self.is_current(admission) {
            return None;
        }

        match self.state {
            State::Closed => {
                self.failure_count = 0;
                None
            }
            State::HalfOpen => {
                self.success_count = self.success_count.saturating_add(1);
                if self.success_count > self.success_threshold {
                    self.failure_count = 0;
                    self.success_count = 0;
                    Some(self.move_to(State::Closed))
                } else {
                    None
                }
            }
            State::Open => None,
        }
    }

    /// Records a failed call.
    ///
    /// Failures from calls admitted under an earlier state are counted while
    /// the circuit is open or half-open but never cause a transition.
    pub(crate) fn on_failure(&mut self, admission: Admission, now: Instant) -> Option<Transition> {
        if !self.is_current(admission) {
            if self.state != State::Closed {
                self.failure_count = self.failure_count.saturating_add(1);
            }
            return None;
        }

        self.failure_count = self.failure_count.saturating_add(1);

        let trip = match self.state {
            State::HalfOpen => true,
            State::Closed => self.failure_count >= self.failure_threshold,
            State::Open => false,
        };

        if trip {
            self.opened_at = now;
            self.success_count = 0;
            Some(self.move_to(State::Open))
        } else {
            None
        }
    }

    fn is_current(&self, admission: Admission) -> bool {
        admission.generation == self.generation
    }

    fn move_to(&mut self, to: State) -> Transition {
        let from = self.state;
        self.state = to;
        self.generation = self.generation.wrapping_add(1);
        Transition { from, to }
    }
}

/// A point-in-time view of the breaker's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    /// Current state.
    pub state: State,
    /// Failures counted since the last reset.
    pub failure_count: u32,
    /// Successful probes counted in the current half-open window.
    pub success_count: u32,
    /// Earliest instant a probe is admitted, while open.
    pub next_attempt_at: Option<Instant>,
}

/// Shares a [`StateMachine`] between concurrent callers.
///
/// Every mutation happens under the mutex. The atomic mirrors the state so
/// that reads never contend with callers.
pub(crate) struct StateManager {
    state: AtomicU8,
    machine: Mutex<StateMachine>,
}

impl StateManager {
    pub(crate) fn new(machine: StateMachine) -> Self {
        Self {
            state: AtomicU8::new(machine.state() as u8),
            machine: Mutex::new(machine),
        }
    }

    /// Gets the current state.
    pub(crate) fn current(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Runs `f` against the machine, publishing the resulting state.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut StateMachine) -> R) -> R {
        let mut machine = self.machine.lock();
        let result = f(&mut machine);
        self.state.store(machine.state() as u8, Ordering::Release);
        result
    }

    pub(crate) fn snapshot(&self) -> BreakerSnapshot {
        let machine = self.machine.lock();
        BreakerSnapshot {
            state: machine.state(),
            failure_count: machine.failure_count(),
            success_count: machine.success_count(),
            next_attempt_at: machine.next_attempt_at(),
        }
    }
}
