//! Builder API for ergonomic circuit breaker configuration

use crate::{
    callbacks::Callbacks,
    circuit::{CircuitBreaker, CircuitContext, Config},
    classifier::DefaultClassifier,
    clock::Clock,
};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating circuit breakers with fluent API
pub struct CircuitBuilder<C = DefaultClassifier> {
    name: String,
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    classifier: C,
    callbacks: Callbacks,
}

impl CircuitBuilder {
    /// Create a new builder for a circuit with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::default(),
            clock: None,
            classifier: DefaultClassifier,
            callbacks: Callbacks::new(),
        }
    }
}

impl<C> CircuitBuilder<C> {
    /// Replace the whole configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the failure threshold
    ///
    /// The circuit opens on the monitored failure observed while the count of
    /// previous consecutive failures already exceeds `threshold`.
    pub fn failure_threshold(mut self, threshold: usize) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Set how long the circuit stays open before a call may close it
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    /// Set the recovery timeout in seconds
    pub fn recovery_timeout_secs(mut self, seconds: f64) -> Self {
        self.config.recovery_timeout =
            Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX);
        self
    }

    /// Set the time source (defaults to a `MonotonicClock`)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set a failure classifier to select which errors count toward tripping
    ///
    /// The classifier also builds the error returned while the circuit is
    /// open, so it fixes the error type the breaker can guard.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lazy_breaker::{CircuitBreaker, FailureContext, PredicateClassifier, RejectionContext};
    ///
    /// #[derive(Debug)]
    /// enum DbError {
    ///     Timeout,
    ///     Constraint,
    /// }
    ///
    /// let circuit = CircuitBreaker::builder("db")
    ///     .failure_classifier(PredicateClassifier::new(
    ///         // Only trip on timeouts
    ///         |ctx: &FailureContext<'_, DbError>| matches!(ctx.error, DbError::Timeout),
    ///         |_: &RejectionContext<'_>| DbError::Timeout,
    ///     ))
    ///     .build();
    ///
    /// let result = circuit.call(|| Err::<(), _>(DbError::Constraint));
    /// assert!(matches!(result, Err(DbError::Constraint)));
    /// assert_eq!(circuit.failure_count(), 0);
    /// ```
    pub fn failure_classifier<K>(self, classifier: K) -> CircuitBuilder<K> {
        CircuitBuilder {
            name: self.name,
            config: self.config,
            clock: self.clock,
            classifier,
            callbacks: self.callbacks,
        }
    }

    /// Set callback for when circuit opens
    ///
    /// Hooks run on the thread that caused the transition, after the breaker
    /// has released its lock. Transitions made by one thread reach the hooks
    /// in order; hooks fired from different threads racing on the same
    /// breaker may observe an open and a close in either order, so query
    /// [`CircuitBreaker::state`] when the current state matters.
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_open = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit closes after having been open
    ///
    /// Runs under the same threading and ordering rules as [`on_open`](Self::on_open).
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_close = Some(Arc::new(f));
        self
    }

    /// Build the circuit breaker
    pub fn build(self) -> CircuitBreaker<C> {
        let mut context = CircuitContext {
            name: self.name,
            config: self.config,
            ..Default::default()
        };
        if let Some(clock) = self.clock {
            context.clock = clock;
        }

        CircuitBreaker::with_parts(context, self.classifier, self.callbacks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{BoxError, TypeClassifier};

    #[test]
    fn test_builder_defaults() {
        let circuit = CircuitBuilder::new("test").build();

        assert_eq!(circuit.state_name(), "Closed");
        assert!(circuit.is_closed());
        assert_eq!(circuit.name(), "test");
        assert_eq!(circuit.config(), &Config::default());
    }

    #[test]
    fn test_builder_custom_config() {
        let circuit = CircuitBuilder::new("test")
            .failure_threshold(10)
            .recovery_timeout_secs(1.5)
            .build();

        assert!(circuit.is_closed());
        assert_eq!(circuit.config().failure_threshold, 10);
        assert_eq!(circuit.config().recovery_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_builder_negative_timeout_clamps_to_zero() {
        let circuit = CircuitBuilder::new("test")
            .recovery_timeout_secs(-4.0)
            .build();

        assert_eq!(circuit.config().recovery_timeout, Duration::ZERO);
    }

    #[test]
    fn test_builder_whole_config() {
        let config = Config {
            failure_threshold: 1,
            recovery_timeout: Duration::from_secs(60),
        };
        let circuit = CircuitBuilder::new("test").config(config.clone()).build();

        assert_eq!(circuit.config(), &config);
    }

    #[test]
    fn test_builder_with_callbacks() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let opened = Arc::new(AtomicBool::new(false));
        let opened_clone = opened.clone();

        let circuit = CircuitBuilder::new("test")
            .failure_threshold(1)
            .on_open(move |_name| {
                opened_clone.store(true, Ordering::SeqCst);
            })
            .build();

        // Trigger failures to open circuit
        for _ in 0..3 {
            let _ = circuit.call(|| Err::<(), BoxError>("error".into()));
        }

        // Callback should have been triggered
        assert!(opened.load(Ordering::SeqCst));
    }

    #[test]
    fn test_builder_keeps_settings_across_classifier_swap() {
        #[derive(Debug, Default, thiserror::Error)]
        #[error("quota exceeded")]
        struct QuotaExceeded;

        let circuit = CircuitBuilder::new("quota")
            .failure_threshold(0)
            .recovery_timeout(Duration::from_secs(9))
            .failure_classifier(TypeClassifier::<QuotaExceeded>::new())
            .build();

        assert_eq!(circuit.name(), "quota");
        assert_eq!(circuit.config().failure_threshold, 0);
        assert_eq!(circuit.config().recovery_timeout, Duration::from_secs(9));

        let _ = circuit.call(|| Err::<(), BoxError>(Box::new(QuotaExceeded)));
        let _ = circuit.call(|| Err::<(), BoxError>(Box::new(QuotaExceeded)));
        assert!(circuit.is_open());
    }
}
