//! Advanced Circuit Breaker Example
//!
//! This example demonstrates:
//! 1. Guarding an action that takes arguments
//! 2. Using hooks for monitoring circuit breaker events
//! 3. Handling open-circuit rejections separately from operation failures

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use tripwire::{BreakerError, CircuitBreaker, HookRegistry};

#[derive(Debug)]
struct ServiceError(String);

impl ServiceError {
    fn new(msg: &str) -> Self {
        ServiceError(msg.to_string())
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

/// Simulates a remote inventory lookup with a failure burst in the middle.
struct Inventory {
    calls: AtomicU32,
}

impl Inventory {
    async fn stock(&self, sku: &str, warehouse: u32) -> Result<u32, ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(20)).await;

        match call {
            1..=3 => Ok(sku.len() as u32 * warehouse),
            4..=8 => Err(ServiceError::new("inventory service temporarily unavailable")),
            _ => Ok(sku.len() as u32 * warehouse + 1),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tripwire=debug")),
        )
        .init();

    println!("=== Advanced Circuit Breaker Example ===\n");

    // 1. Set up a hook registry for observability
    let hooks = HookRegistry::new();
    hooks.set_on_open(|| println!("Circuit OPENED due to too many failures"));
    hooks.set_on_close(|| println!("Circuit CLOSED after successful recovery"));
    hooks.set_on_half_open(|| println!("Circuit HALF-OPEN, testing if service recovered"));
    hooks.set_on_rejected(|| println!("Call rejected without reaching the service"));

    // 2. Bind the breaker to the lookup; arguments travel as a tuple
    let inventory = Arc::new(Inventory {
        calls: AtomicU32::new(0),
    });
    let lookup = move |(sku, warehouse): (&'static str, u32)| {
        let inventory = Arc::clone(&inventory);
        async move { inventory.stock(sku, warehouse).await }
    };

    let breaker = CircuitBreaker::builder(lookup)
        .failure_threshold(3) // Trip after 3 failures in a row
        .success_threshold(1) // Close after 2 successful probes
        .timeout(Duration::from_secs(2)) // Stay open for 2 seconds
        .hooks(hooks)
        .build()?;

    println!("Initial state: {}\n", breaker.state());

    // 3. Drive a series of calls through the breaker
    for i in 1..=15 {
        println!("\n--- Call {} ---", i);

        match breaker.fire(("widget", 4)).await {
            Ok(stock) => println!("Stock level: {}", stock),
            Err(BreakerError::Open) => println!("Circuit open, call not attempted"),
            Err(BreakerError::Operation { source, state }) => {
                println!("Lookup failed while {}: {}", state, source)
            }
        }

        let snapshot = breaker.snapshot();
        println!(
            "Circuit: state={}, failures={}, probe_successes={}",
            snapshot.state, snapshot.failure_count, snapshot.success_count
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    println!("\n=== Example Completed ===");
    Ok(())
}
