//! Circuit breaker implementation using state machines
//!
//! The breaker is evaluated lazily: every call first checks whether an open
//! circuit has waited out its recovery timeout, then either runs the wrapped
//! closure or rejects it. Bookkeeping happens under a short-lived lock that is
//! never held while the wrapped closure runs.

use crate::{
    callbacks::Callbacks,
    classifier::{DefaultClassifier, FailureClassifier, FailureContext, RejectionContext},
    clock::{Clock, MonotonicClock},
};
use parking_lot::Mutex;
use state_machines::state_machine;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Number of consecutive monitored failures tolerated before tripping.
    /// The circuit opens on the failure observed while the count already
    /// exceeds this value, i.e. on failure number `failure_threshold + 2`.
    pub failure_threshold: usize,

    /// Minimum time the circuit stays open before the next call may close it
    pub recovery_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(3),
        }
    }
}

/// Observable circuit state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum State {
    /// Calls pass through
    Closed,
    /// Calls are rejected without running
    Open,
    /// Reserved for a trial-call recovery phase; never entered today
    HalfOpen,
}

impl State {
    /// State name as reported by the underlying state machine
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "Closed",
            State::Open => "Open",
            State::HalfOpen => "HalfOpen",
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "Open" => State::Open,
            "HalfOpen" => State::HalfOpen,
            _ => State::Closed,
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker context - shared data across all states
///
/// The failure counter stays crate-private so only the breaker writes it:
///
/// ```compile_fail
/// let ctx = lazy_breaker::circuit::CircuitContext::default();
/// ctx.failures.store(7, std::sync::atomic::Ordering::SeqCst);
/// ```
#[derive(Debug, Clone)]
pub struct CircuitContext {
    pub name: String,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    /// Consecutive monitored failures, only written while the machine lock is held
    pub(crate) failures: Arc<AtomicUsize>,
}

impl Default for CircuitContext {
    fn default() -> Self {
        Self {
            name: String::new(),
            config: Config::default(),
            clock: Arc::new(MonotonicClock::new()),
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    pub opened_at: Duration,
}

// HalfOpen is declared so the state space is complete, but no event targets it.
state_machine! {
    name: Circuit,
    context: CircuitContext,
    dynamic: true,

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
        HalfOpen,
    ],
    events {
        trip {
            guards: [threshold_exceeded],
            transition: { from: Closed, to: Open }
        }
        expire {
            guards: [recovery_elapsed],
            transition: { from: Open, to: Closed }
        }
        reset {
            transition: { from: [Open, HalfOpen], to: Closed }
        }
    }
}

impl Circuit<Closed> {
    /// Compares the count recorded before the current failure is added
    fn threshold_exceeded(&self, ctx: &CircuitContext) -> bool {
        ctx.failures.load(Ordering::Acquire) > ctx.config.failure_threshold
    }
}

impl Circuit<Open> {
    /// Check if the recovery timeout has elapsed since the circuit opened
    fn recovery_elapsed(&self, ctx: &CircuitContext) -> bool {
        self.state_data_open().is_none_or(|data| {
            let elapsed = ctx.clock.monotonic_time().saturating_sub(data.opened_at);
            elapsed >= ctx.config.recovery_timeout
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum CloseReason {
    Success,
    RecoveryElapsed,
    ManualReset,
}

impl CloseReason {
    fn as_str(self) -> &'static str {
        match self {
            CloseReason::Success => "success",
            CloseReason::RecoveryElapsed => "recovery_elapsed",
            CloseReason::ManualReset => "manual_reset",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Opened { failures: usize },
    Closed(CloseReason),
}

struct Machine {
    circuit: DynamicCircuit,
    transitioned_at: Duration,
}

/// Circuit breaker public API
///
/// Share it between threads with an `Arc`; all methods take `&self`.
pub struct CircuitBreaker<C = DefaultClassifier> {
    machine: Mutex<Machine>,
    context: CircuitContext,
    classifier: C,
    callbacks: Callbacks,
}

impl CircuitBreaker {
    /// Create a new circuit breaker (use builder() for more options)
    pub fn new(name: impl Into<String>, config: Config) -> Self {
        let context = CircuitContext {
            name: name.into(),
            config,
            ..Default::default()
        };

        Self::with_parts(context, DefaultClassifier, Callbacks::new())
    }

    /// Create a new circuit breaker builder
    pub fn builder(name: impl Into<String>) -> crate::builder::CircuitBuilder {
        crate::builder::CircuitBuilder::new(name)
    }
}

impl<C> CircuitBreaker<C> {
    /// Create a circuit breaker from prepared parts (used by builder)
    pub(crate) fn with_parts(context: CircuitContext, classifier: C, callbacks: Callbacks) -> Self {
        let machine = Machine {
            circuit: DynamicCircuit::new(context.clone()),
            transitioned_at: context.clock.monotonic_time(),
        };

        Self {
            machine: Mutex::new(machine),
            context,
            classifier,
            callbacks,
        }
    }

    /// Execute a fallible operation with circuit breaker protection
    ///
    /// While the circuit is open the closure is not run and the classifier's
    /// rejection error is returned instead. Errors the classifier does not
    /// monitor are returned untouched and leave the breaker as it was.
    pub fn call<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        C: FailureClassifier<E>,
    {
        if let Err(opened_at) = self.admit() {
            tracing::trace!(circuit = %self.context.name, "call rejected, circuit open");
            return Err(self.classifier.rejection(&RejectionContext {
                circuit_name: &self.context.name,
                opened_at: opened_at.as_secs_f64(),
            }));
        }

        let start = self.context.clock.monotonic_time();

        match f() {
            Ok(val) => {
                self.record_success();
                Ok(val)
            }
            Err(e) => {
                let ctx = FailureContext {
                    circuit_name: &self.context.name,
                    error: &e,
                    duration: self
                        .context
                        .clock
                        .monotonic_time()
                        .saturating_sub(start)
                        .as_secs_f64(),
                };

                if self.classifier.should_trip(&ctx) {
                    self.record_failure();
                }

                Err(e)
            }
        }
    }

    /// Wrap a zero-argument operation so every invocation goes through [`call`](Self::call)
    pub fn protect<T, E, F>(self: &Arc<Self>, f: F) -> impl Fn() -> Result<T, E> + use<T, E, F, C>
    where
        F: Fn() -> Result<T, E>,
        C: FailureClassifier<E>,
    {
        let breaker = Arc::clone(self);
        move || breaker.call(&f)
    }

    /// Wrap a one-argument operation so every invocation goes through [`call`](Self::call)
    ///
    /// Operations taking several arguments take them as a tuple.
    pub fn decorate<A, T, E, F>(
        self: &Arc<Self>,
        f: F,
    ) -> impl Fn(A) -> Result<T, E> + use<A, T, E, F, C>
    where
        F: Fn(A) -> Result<T, E>,
        C: FailureClassifier<E>,
    {
        let breaker = Arc::clone(self);
        move |arg| breaker.call(|| f(arg))
    }

    /// Record a successful operation: forces Closed and clears the failure count
    pub fn record_success(&self) {
        let transition = {
            let mut machine = self.machine.lock();
            self.context.failures.store(0, Ordering::Release);

            if machine.circuit.current_state() != "Closed"
                && machine.circuit.handle(CircuitEvent::Reset).is_ok()
            {
                machine.transitioned_at = self.context.clock.monotonic_time();
                Some(Transition::Closed(CloseReason::Success))
            } else {
                None
            }
        };

        if let Some(transition) = transition {
            self.announce(transition);
        }
    }

    /// Record a monitored failure and trip the circuit if the threshold is exceeded
    pub fn record_failure(&self) {
        let transition = {
            let mut machine = self.machine.lock();
            // The trip guard reads the count before this failure is added
            let tripped = machine.circuit.current_state() == "Closed"
                && machine.circuit.handle(CircuitEvent::Trip).is_ok();
            let failures = self.context.failures.fetch_add(1, Ordering::AcqRel) + 1;

            if tripped {
                let now = self.context.clock.monotonic_time();
                if let Some(data) = machine.circuit.open_data_mut() {
                    data.opened_at = now;
                }
                machine.transitioned_at = now;
                Some(Transition::Opened { failures })
            } else {
                None
            }
        };

        if let Some(transition) = transition {
            self.announce(transition);
        }
    }

    /// Clear the failure count and force the circuit Closed
    pub fn reset(&self) {
        let transition = {
            let mut machine = self.machine.lock();
            self.context.failures.store(0, Ordering::Release);

            if machine.circuit.current_state() == "Closed" {
                None
            } else {
                // Recreate machine in Closed state
                machine.circuit = DynamicCircuit::new(self.context.clone());
                machine.transitioned_at = self.context.clock.monotonic_time();
                Some(Transition::Closed(CloseReason::ManualReset))
            }
        };

        if let Some(transition) = transition {
            self.announce(transition);
        }
    }

    /// Current state, without applying a pending recovery
    pub fn state(&self) -> State {
        State::from_name(self.state_name())
    }

    /// Get current state name
    pub fn state_name(&self) -> &'static str {
        self.machine.lock().circuit.current_state()
    }

    /// Check if circuit is open
    pub fn is_open(&self) -> bool {
        self.state() == State::Open
    }

    /// Check if circuit is closed
    pub fn is_closed(&self) -> bool {
        self.state() == State::Closed
    }

    /// Consecutive monitored failures since the last success or reset
    pub fn failure_count(&self) -> usize {
        self.context.failures.load(Ordering::Acquire)
    }

    /// Monotonic time of the most recent state transition
    pub fn last_transition_at(&self) -> Duration {
        self.machine.lock().transitioned_at
    }

    /// Circuit name
    pub fn name(&self) -> &str {
        &self.context.name
    }

    /// Configuration the breaker was built with
    pub fn config(&self) -> &Config {
        &self.context.config
    }

    /// Close an expired circuit, then decide whether the call may run.
    /// Returns the opening time when the call must be rejected.
    fn admit(&self) -> Result<(), Duration> {
        let (verdict, transition) = {
            let mut machine = self.machine.lock();
            let mut transition = None;

            if machine.circuit.current_state() == "Open"
                && machine.circuit.handle(CircuitEvent::Expire).is_ok()
            {
                self.context.failures.store(0, Ordering::Release);
                machine.transitioned_at = self.context.clock.monotonic_time();
                transition = Some(Transition::Closed(CloseReason::RecoveryElapsed));
            }

            let verdict = if machine.circuit.current_state() == "Open" {
                Err(machine
                    .circuit
                    .open_data()
                    .map(|d| d.opened_at)
                    .unwrap_or_default())
            } else {
                Ok(())
            };

            (verdict, transition)
        };

        if let Some(transition) = transition {
            self.announce(transition);
        }

        verdict
    }

    /// Log a transition and fire its callback, outside the lock
    fn announce(&self, transition: Transition) {
        match transition {
            Transition::Opened { failures } => {
                tracing::warn!(
                    circuit = %self.context.name,
                    failures,
                    threshold = self.context.config.failure_threshold,
                    "circuit opened"
                );
                self.callbacks.trigger_open(&self.context.name);
            }
            Transition::Closed(reason) => {
                tracing::info!(
                    circuit = %self.context.name,
                    reason = reason.as_str(),
                    "circuit closed"
                );
                self.callbacks.trigger_close(&self.context.name);
            }
        }
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.context.name)
            .field("config", &self.context.config)
            .field("state", &self.state_name())
            .field("failures", &self.failure_count())
            .field("classifier", &self.classifier)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
