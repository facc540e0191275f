//! Error types for circuit breaker operations

use thiserror::Error;

/// Returned in place of a call while the circuit is open.
///
/// The breaker never hands this out directly: classifiers turn it into the
/// monitored error type (see [`DefaultClassifier`](crate::DefaultClassifier)),
/// so a rejection looks like any other monitored failure to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Circuit '{circuit}' is open (opened at {opened_at})")]
pub struct CircuitOpen {
    /// Circuit name
    pub circuit: String,
    /// Monotonic time (seconds) at which the circuit opened
    pub opened_at: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_names_circuit() {
        let err = CircuitOpen {
            circuit: "payments".to_string(),
            opened_at: 1.5,
        };
        assert_eq!(err.to_string(), "Circuit 'payments' is open (opened at 1.5)");
    }

    #[test]
    fn test_converts_into_boxed_error() {
        let boxed: Box<dyn Error + Send + Sync> = CircuitOpen {
            circuit: "db".to_string(),
            opened_at: 0.0,
        }
        .into();

        assert!(boxed.downcast_ref::<CircuitOpen>().is_some());
    }
}
