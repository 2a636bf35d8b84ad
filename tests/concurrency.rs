use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tripwire::{CircuitBreaker, HookRegistry, ManualClock, State};

#[derive(Debug)]
struct Unavailable;

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unavailable")
    }
}

impl std::error::Error for Unavailable {}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_are_all_counted() {
    const TASKS: usize = 200;

    let breaker = CircuitBreaker::builder(|()| async {
        tokio::task::yield_now().await;
        Err::<(), _>(Unavailable)
    })
    .failure_threshold(10_000)
    .build()
    .unwrap();

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let breaker = breaker.clone();
            tokio::spawn(async move { breaker.fire(()).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_err());
    }

    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.state, State::Closed);
    assert_eq!(snapshot.failure_count, TASKS as u32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_trip_accounts_for_every_call() {
    const TASKS: usize = 100;

    let calls = Arc::new(AtomicUsize::new(0));
    let action = {
        let calls = Arc::clone(&calls);
        move |()| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Err::<(), _>(Unavailable)
            }
        }
    };

    let breaker = CircuitBreaker::builder(action)
        .failure_threshold(10)
        .timeout(Duration::from_secs(3600))
        .build()
        .unwrap();

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let breaker = breaker.clone();
            tokio::spawn(async move { breaker.fire(()).await })
        })
        .collect();

    let mut rejected = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap_err().is_open() {
            rejected += 1;
        }
    }

    let invoked = calls.load(Ordering::SeqCst);
    assert_eq!(invoked + rejected, TASKS);
    assert!(invoked >= 10);

    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.state, State::Open);
    assert_eq!(snapshot.failure_count as usize, invoked);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_half_open_transition_happens_once() {
    const TASKS: usize = 50;

    let half_opened = Arc::new(AtomicUsize::new(0));
    let hooks = HookRegistry::new();
    {
        let half_opened = Arc::clone(&half_opened);
        hooks.set_on_half_open(move || {
            half_opened.fetch_add(1, Ordering::SeqCst);
        });
    }

    let clock = ManualClock::new();
    let breaker = CircuitBreaker::builder(|ok: bool| async move {
        tokio::task::yield_now().await;
        if ok {
            Ok(())
        } else {
            Err(Unavailable)
        }
    })
    .failure_threshold(1)
    .success_threshold(1_000)
    .timeout(Duration::from_millis(10))
    .hooks(hooks)
    .clock(clock.clone())
    .build()
    .unwrap();

    assert!(breaker.fire(false).await.is_err());
    assert_eq!(breaker.state(), State::Open);

    clock.advance(Duration::from_millis(10));

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let breaker = breaker.clone();
            tokio::spawn(async move { breaker.fire(true).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(half_opened.load(Ordering::SeqCst), 1);
    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.state, State::HalfOpen);
    assert_eq!(snapshot.success_count, TASKS as u32);
}

type Gated = (bool, Option<Arc<Notify>>);
type GatedOutcome = Pin<Box<dyn Future<Output = Result<(), Unavailable>> + Send>>;

// Action that can be held mid-flight until its gate is notified.
fn gated(started: &Arc<AtomicUsize>) -> impl Fn(Gated) -> GatedOutcome + Send + Sync + 'static {
    let started = Arc::clone(started);
    move |(ok, gate): Gated| -> GatedOutcome {
        let started = Arc::clone(&started);
        Box::pin(async move {
            started.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if ok {
                Ok(())
            } else {
                Err(Unavailable)
            }
        })
    }
}

async fn wait_until_started(started: &AtomicUsize, count: usize) {
    while started.load(Ordering::SeqCst) < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_late_success_while_open_is_ignored() {
    let started = Arc::new(AtomicUsize::new(0));
    let clock = ManualClock::new();
    let breaker = CircuitBreaker::builder(gated(&started))
        .failure_threshold(1)
        .timeout(Duration::from_millis(100))
        .clock(clock.clone())
        .build()
        .unwrap();

    let gate = Arc::new(Notify::new());
    let slow = {
        let breaker = breaker.clone();
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { breaker.fire((true, Some(gate))).await })
    };
    wait_until_started(&started, 1).await;

    assert!(breaker.fire((false, None)).await.is_err());
    let tripped = breaker.snapshot();
    assert_eq!(tripped.state, State::Open);

    clock.advance(Duration::from_millis(5));
    gate.notify_one();
    assert!(slow.await.unwrap().is_ok());

    assert_eq!(breaker.snapshot(), tripped);
}

#[tokio::test]
async fn test_late_failure_while_open_keeps_cooldown() {
    let started = Arc::new(AtomicUsize::new(0));
    let clock = ManualClock::new();
    let breaker = CircuitBreaker::builder(gated(&started))
        .failure_threshold(1)
        .timeout(Duration::from_millis(100))
        .clock(clock.clone())
        .build()
        .unwrap();

    let gate = Arc::new(Notify::new());
    let slow = {
        let breaker = breaker.clone();
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { breaker.fire((false, Some(gate))).await })
    };
    wait_until_started(&started, 1).await;

    assert!(breaker.fire((false, None)).await.is_err());
    let next_attempt_at = breaker.snapshot().next_attempt_at;

    clock.advance(Duration::from_millis(5));
    gate.notify_one();
    let err = slow.await.unwrap().unwrap_err();
    assert_eq!(err.state(), State::Closed);

    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.state, State::Open);
    assert_eq!(snapshot.failure_count, 2);
    assert_eq!(snapshot.next_attempt_at, next_attempt_at);
}

#[tokio::test]
async fn test_closed_era_success_does_not_count_as_probe() {
    let started = Arc::new(AtomicUsize::new(0));
    let clock = ManualClock::new();
    let breaker = CircuitBreaker::builder(gated(&started))
        .failure_threshold(1)
        .success_threshold(1)
        .timeout(Duration::from_millis(10))
        .clock(clock.clone())
        .build()
        .unwrap();

    let gate = Arc::new(Notify::new());
    let slow = {
        let breaker = breaker.clone();
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { breaker.fire((true, Some(gate))).await })
    };
    wait_until_started(&started, 1).await;

    assert!(breaker.fire((false, None)).await.is_err());
    clock.advance(Duration::from_millis(10));
    assert!(breaker.fire((true, None)).await.is_ok());
    assert_eq!(breaker.snapshot().success_count, 1);

    gate.notify_one();
    assert!(slow.await.unwrap().is_ok());

    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.state, State::HalfOpen);
    assert_eq!(snapshot.success_count, 1);

    // A second real probe is still required
    assert!(breaker.fire((true, None)).await.is_ok());
    assert_eq!(breaker.state(), State::Closed);
}

#[tokio::test]
async fn test_closed_era_failure_does_not_reopen_half_open() {
    let started = Arc::new(AtomicUsize::new(0));
    let clock = ManualClock::new();
    let breaker = CircuitBreaker::builder(gated(&started))
        .failure_threshold(1)
        .success_threshold(1)
        .timeout(Duration::from_millis(10))
        .clock(clock.clone())
        .build()
        .unwrap();

    let gate = Arc::new(Notify::new());
    let slow = {
        let breaker = breaker.clone();
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { breaker.fire((false, Some(gate))).await })
    };
    wait_until_started(&started, 1).await;

    assert!(breaker.fire((false, None)).await.is_err());
    clock.advance(Duration::from_millis(10));
    assert!(breaker.fire((true, None)).await.is_ok());

    gate.notify_one();
    let err = slow.await.unwrap().unwrap_err();
    assert_eq!(err.state(), State::Closed);

    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.state, State::HalfOpen);
    assert_eq!(snapshot.success_count, 1);
    assert_eq!(snapshot.failure_count, 2);
    assert_eq!(snapshot.next_attempt_at, None);

    assert!(breaker.fire((true, None)).await.is_ok());
    assert_eq!(breaker.state(), State::Closed);
}
