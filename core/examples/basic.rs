//! Basic circuit breaker usage example

use lazy_breaker::{BoxError, CircuitBreaker};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Circuit Breaker Basic Example ===\n");

    // Create a circuit with builder API
    let circuit = Arc::new(
        CircuitBreaker::builder("payment_api")
            .failure_threshold(2)
            .recovery_timeout(Duration::from_secs(1))
            .on_open(|name| println!("🔴 Circuit '{}' opened!", name))
            .on_close(|name| println!("🟢 Circuit '{}' closed!", name))
            .build(),
    );

    let charge = circuit.decorate(|amount: u32| -> Result<String, BoxError> {
        if amount > 100 {
            Err(format!("payment of {} declined upstream", amount).into())
        } else {
            Ok(format!("charged {}", amount))
        }
    });

    println!("Initial state: {}\n", circuit.state_name());

    // Simulate successful calls
    println!("--- Successful calls ---");
    for amount in [10, 20] {
        match charge(amount) {
            Ok(result) => println!("✓ {}", result),
            Err(e) => println!("✗ Error: {}", e),
        }
    }
    println!("State: {}\n", circuit.state_name());

    // Simulate failures: threshold + 2 failures trip the circuit
    println!("--- Triggering failures ---");
    for amount in [500, 600, 700, 800] {
        match charge(amount) {
            Ok(_) => println!("✓ Success"),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!("State: {} (circuit opened)\n", circuit.state_name());

    // Try calling while open
    println!("--- Attempting call while open ---");
    match charge(5) {
        Ok(_) => println!("✓ Success"),
        Err(e) => println!("✗ {}", e),
    }
    println!();

    // Wait out the recovery timeout
    println!("--- Waiting for recovery ---");
    std::thread::sleep(Duration::from_millis(1100));
    match charge(5) {
        Ok(result) => println!("✓ {}", result),
        Err(e) => println!("✗ {}", e),
    }
    println!("State: {}", circuit.state_name());
}
