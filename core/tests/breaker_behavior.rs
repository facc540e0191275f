use lazy_breaker::{BoxError, CircuitBreaker, ManualClock, State, TypeClassifier};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default, thiserror::Error)]
#[error("dependency failed")]
struct DependencyFailed;

fn dependency_failed() -> Result<(), BoxError> {
    Err(Box::new(DependencyFailed))
}

fn succeed() -> Result<(), BoxError> {
    Ok(())
}

fn watched_breaker(clock: Arc<ManualClock>) -> Arc<CircuitBreaker<TypeClassifier<DependencyFailed>>> {
    Arc::new(
        CircuitBreaker::builder("dependency")
            .failure_threshold(5)
            .recovery_timeout(Duration::from_secs(3))
            .failure_classifier(TypeClassifier::<DependencyFailed>::new())
            .clock(clock)
            .build(),
    )
}

#[test]
fn test_trip_reject_and_recover() {
    let clock = Arc::new(ManualClock::new());
    let breaker = watched_breaker(clock.clone());
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = runs.clone();
    let fail_operation = breaker.protect(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        dependency_failed()
    });
    let success_operation = breaker.protect(succeed);

    success_operation().expect("closed breaker lets the call through");
    assert_eq!(breaker.state(), State::Closed);

    for _ in 0..8 {
        let err = fail_operation().unwrap_err();
        assert!(err.is::<DependencyFailed>());
    }

    // The 7th failure trips, the 8th never runs
    assert_eq!(runs.load(Ordering::SeqCst), 7);
    assert_eq!(breaker.state(), State::Open);

    let err = success_operation().unwrap_err();
    assert!(err.is::<DependencyFailed>(), "rejection uses the monitored failure type");

    clock.advance(Duration::from_secs(5));
    success_operation().expect("this operation should succeed after waiting on the circuit timeout");
    assert_eq!(breaker.state(), State::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[test]
fn test_unmonitored_failures_never_touch_state() {
    let clock = Arc::new(ManualClock::new());
    let breaker = watched_breaker(clock.clone());

    for _ in 0..3 {
        let _ = breaker.call(dependency_failed);
    }
    for _ in 0..20 {
        let err = breaker
            .call(|| Err::<(), BoxError>("validation error".into()))
            .unwrap_err();
        assert_eq!(err.to_string(), "validation error");
    }
    assert_eq!(breaker.failure_count(), 3);
    assert_eq!(breaker.state(), State::Closed);

    for _ in 0..4 {
        let _ = breaker.call(dependency_failed);
    }
    assert_eq!(breaker.state(), State::Open);

    clock.advance(Duration::from_secs(3));
    let err = breaker
        .call(|| Err::<(), BoxError>("validation error".into()))
        .unwrap_err();
    assert_eq!(err.to_string(), "validation error");
    // Expiry closed the circuit, the unmonitored failure left it that way
    assert_eq!(breaker.state(), State::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[test]
fn test_recovery_with_real_clock() {
    let breaker = CircuitBreaker::builder("realtime")
        .failure_threshold(0)
        .recovery_timeout(Duration::from_millis(50))
        .build();

    let _ = breaker.call(|| Err::<(), BoxError>("error 1".into()));
    let _ = breaker.call(|| Err::<(), BoxError>("error 2".into()));
    assert!(breaker.is_open());
    assert!(breaker.call(succeed).is_err());

    std::thread::sleep(Duration::from_millis(80));

    assert!(breaker.call(succeed).is_ok());
    assert!(breaker.is_closed());
}

#[test]
fn test_concurrent_failures_below_threshold_stay_closed() {
    let breaker = Arc::new(CircuitBreaker::builder("shared").failure_threshold(16).build());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let breaker = Arc::clone(&breaker);
            std::thread::spawn(move || {
                let _ = breaker.call(|| Err::<(), BoxError>("error".into()));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // No lost updates
    assert_eq!(breaker.failure_count(), 16);
    assert!(breaker.is_closed());
}

#[test]
fn test_concurrent_failures_above_threshold_open() {
    let breaker = Arc::new(CircuitBreaker::builder("shared").failure_threshold(4).build());
    let runs = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let breaker = Arc::clone(&breaker);
            let runs = Arc::clone(&runs);
            std::thread::spawn(move || {
                let _ = breaker.call(|| {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Err::<(), BoxError>("error".into())
                });
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let runs = runs.load(Ordering::SeqCst);
    assert!(runs > 5, "at least threshold + 2 failures ran");
    assert_eq!(breaker.failure_count(), runs);
    assert!(breaker.is_open());
}

#[test]
fn test_wrapped_calls_run_in_parallel() {
    use std::sync::Barrier;

    let breaker = Arc::new(CircuitBreaker::builder("parallel").build());
    let barrier = Arc::new(Barrier::new(4));

    // Every thread waits inside the wrapped call; this only finishes if the
    // breaker does not serialize the calls themselves.
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let breaker = Arc::clone(&breaker);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                breaker.call(|| {
                    barrier.wait();
                    Ok::<_, BoxError>(i)
                })
            })
        })
        .collect();

    let mut results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();
    results.sort();

    assert_eq!(results, vec![0, 1, 2, 3]);
}
