//! lazy-breaker - Thread-safe circuit breaker for synchronous calls
//!
//! This crate provides a circuit breaker with:
//! - Lazily evaluated recovery (no background timers, checked on every call)
//! - State machine for the breaker lifecycle (Closed → Open → Closed)
//! - Failure classifiers deciding which errors count and what a rejection returns
//! - Monotonic time tracking to prevent NTP clock skew issues
//!
//! # Example
//!
//! ```rust
//! use lazy_breaker::{BoxError, CircuitBreaker};
//! use std::time::Duration;
//!
//! let circuit = CircuitBreaker::builder("my_service")
//!     .failure_threshold(5)
//!     .recovery_timeout(Duration::from_secs(3))
//!     .on_open(|name| println!("Circuit {} opened!", name))
//!     .build();
//!
//! // Execute with circuit protection
//! let result = circuit.call(|| {
//!     // Your service call here
//!     Ok::<_, BoxError>("success")
//! });
//! assert!(result.is_ok());
//!
//! // Check circuit state
//! if circuit.is_open() {
//!     println!("Circuit is open, skipping call");
//! }
//! ```

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod classifier;
pub mod clock;
pub mod errors;

pub use builder::CircuitBuilder;
pub use circuit::{CircuitBreaker, Config, State};
pub use classifier::{
    BoxError, DefaultClassifier, FailureClassifier, FailureContext, PredicateClassifier,
    RejectionContext, TypeClassifier,
};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use errors::CircuitOpen;
