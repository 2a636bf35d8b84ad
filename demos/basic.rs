use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use tripwire::{BreakerError, CircuitBreaker};

// Custom error type that implements Error trait
#[derive(Debug)]
struct ServiceError(String);

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tripwire=debug")),
        )
        .init();

    // Fails on every second call for the first ten calls, then recovers
    let counter = Arc::new(AtomicU32::new(0));
    let call_service = {
        let counter = Arc::clone(&counter);
        move |()| {
            let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if count <= 10 && count % 2 == 0 {
                    Err(ServiceError("External service error".to_string()))
                } else {
                    Ok("Success".to_string())
                }
            }
        }
    };

    let breaker = CircuitBreaker::builder(call_service)
        .failure_threshold(1)
        .success_threshold(1)
        .timeout(Duration::from_secs(1))
        .build()?;

    println!("Circuit initial state: {}", breaker.state());

    for i in 1..=15 {
        println!("\nAttempt {}: ", i);

        match breaker.fire(()).await {
            Ok(result) => println!("Call succeeded with result: {}", result),
            Err(BreakerError::Open) => {
                println!("Circuit is open, waiting before retry...");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(err) => println!("Call failed with error: {}", err),
        }

        println!("Current state: {}", breaker.state());

        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    Ok(())
}
