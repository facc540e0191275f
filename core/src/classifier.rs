//! Failure classification for error filtering
//!
//! This module provides traits and types for determining which errors
//! count toward tripping the circuit breaker and which simply pass through.
//! A classifier also decides what a rejected call returns: rejections use the
//! monitored error type, so callers handle them like any other monitored
//! failure.

use crate::errors::CircuitOpen;
use std::error::Error;
use std::marker::PhantomData;

/// Boxed error type accepted by [`TypeClassifier`]
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Context provided to failure classifiers for error evaluation
#[derive(Debug)]
pub struct FailureContext<'a, E> {
    /// Circuit name
    pub circuit_name: &'a str,
    /// The error returned by the wrapped call
    pub error: &'a E,
    /// Duration of the failed call in seconds
    pub duration: f64,
}

/// Context provided to classifiers when a call is rejected
#[derive(Debug, Clone, Copy)]
pub struct RejectionContext<'a> {
    /// Circuit name
    pub circuit_name: &'a str,
    /// Monotonic time (seconds) at which the circuit opened
    pub opened_at: f64,
}

/// Trait for classifying failures - determines if an error should trip the circuit
///
/// Implementors inspect the error to decide whether this particular failure
/// counts toward opening the circuit, and build the error handed back while
/// the circuit is open.
///
/// # Examples
///
/// ```rust
/// use lazy_breaker::{FailureClassifier, FailureContext, RejectionContext};
///
/// #[derive(Debug)]
/// enum ApiError {
///     Unavailable,
///     NotFound,
/// }
///
/// #[derive(Debug)]
/// struct UnavailableOnly;
///
/// impl FailureClassifier<ApiError> for UnavailableOnly {
///     fn should_trip(&self, ctx: &FailureContext<'_, ApiError>) -> bool {
///         matches!(ctx.error, ApiError::Unavailable)
///     }
///
///     fn rejection(&self, _ctx: &RejectionContext<'_>) -> ApiError {
///         ApiError::Unavailable
///     }
/// }
/// ```
pub trait FailureClassifier<E>: Send + Sync + std::fmt::Debug {
    /// Determine if this error should count as a failure for circuit breaker logic
    ///
    /// Returns `true` if the error should count, `false` to let it pass untouched.
    fn should_trip(&self, ctx: &FailureContext<'_, E>) -> bool;

    /// Build the error returned in place of a call while the circuit is open
    fn rejection(&self, ctx: &RejectionContext<'_>) -> E;
}

/// Default classifier that trips on all errors
///
/// Rejections are a [`CircuitOpen`] converted into the caller's error type,
/// which works out of the box for `Box<dyn Error + Send + Sync>` and for any
/// error enum with a `From<CircuitOpen>` conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<E> FailureClassifier<E> for DefaultClassifier
where
    E: From<CircuitOpen>,
{
    fn should_trip(&self, _ctx: &FailureContext<'_, E>) -> bool {
        true
    }

    fn rejection(&self, ctx: &RejectionContext<'_>) -> E {
        CircuitOpen {
            circuit: ctx.circuit_name.to_string(),
            opened_at: ctx.opened_at,
        }
        .into()
    }
}

/// Predicate-based classifier using closures
///
/// `predicate` selects the monitored errors, `rejection` builds the error
/// returned while the circuit is open.
pub struct PredicateClassifier<P, R> {
    predicate: P,
    rejection: R,
}

impl<P, R> PredicateClassifier<P, R> {
    /// Create a new predicate-based classifier
    pub fn new<E>(predicate: P, rejection: R) -> Self
    where
        P: Fn(&FailureContext<'_, E>) -> bool + Send + Sync,
        R: Fn(&RejectionContext<'_>) -> E + Send + Sync,
    {
        Self {
            predicate,
            rejection,
        }
    }
}

impl<E, P, R> FailureClassifier<E> for PredicateClassifier<P, R>
where
    P: Fn(&FailureContext<'_, E>) -> bool + Send + Sync,
    R: Fn(&RejectionContext<'_>) -> E + Send + Sync,
{
    fn should_trip(&self, ctx: &FailureContext<'_, E>) -> bool {
        (self.predicate)(ctx)
    }

    fn rejection(&self, ctx: &RejectionContext<'_>) -> E {
        (self.rejection)(ctx)
    }
}

impl<P, R> std::fmt::Debug for PredicateClassifier<P, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateClassifier")
            .field("predicate", &"<closure>")
            .field("rejection", &"<closure>")
            .finish()
    }
}

/// Classifier monitoring one concrete error type inside boxed errors
///
/// Errors that downcast to `K` are counted, everything else passes through.
/// Rejected calls return `K::default()`, so a caller matching on `K` sees the
/// same failure whether the dependency failed or the circuit refused the call.
pub struct TypeClassifier<K> {
    _kind: PhantomData<fn() -> K>,
}

impl<K> TypeClassifier<K> {
    pub fn new() -> Self {
        Self { _kind: PhantomData }
    }
}

impl<K> Default for TypeClassifier<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for TypeClassifier<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for TypeClassifier<K> {}

impl<K> std::fmt::Debug for TypeClassifier<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeClassifier")
            .field("kind", &std::any::type_name::<K>())
            .finish()
    }
}

impl<K> FailureClassifier<BoxError> for TypeClassifier<K>
where
    K: Error + Default + Send + Sync + 'static,
{
    fn should_trip(&self, ctx: &FailureContext<'_, BoxError>) -> bool {
        ctx.error.is::<K>()
    }

    fn rejection(&self, _ctx: &RejectionContext<'_>) -> BoxError {
        Box::new(K::default())
    }
}
