use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use rxlite::{
    scheduler, Observable, ObservableExt, Subscribeable, Subscriber, UnhandledError,
    Unsubscribeable,
};
use uuid::Uuid;

mod custom_error;
mod generate_observable;

use custom_error::CustomError;
use generate_observable::{call_slow_service, generate_u32_observable, slow_uuid};

fn failing_callable(speed: Duration, raised: CustomError) -> Observable<Uuid> {
    Observable::from_callable(move || {
        call_slow_service(speed);
        Err::<Uuid, _>(raised.clone())
    })
}

/// Runs `observable` with a bare subscription and returns the error that
/// escaped to this thread, if any.
fn run_and_catch(observable: Observable<Uuid>) -> Option<UnhandledError> {
    match catch_unwind(AssertUnwindSafe(|| observable.run())) {
        Ok(_) => None,
        Err(payload) => match payload.downcast::<UnhandledError>() {
            Ok(unhandled) => Some(*unhandled),
            Err(_) => panic!("unexpected panic payload"),
        },
    }
}

#[test]
fn from_callable_without_subscription_runs_nothing() {
    let speed = Duration::from_millis(1000);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_c = Arc::clone(&calls);
    let start = Instant::now();

    let _observable = Observable::from_fn(move || {
        calls_c.fetch_add(1, Ordering::SeqCst);
        call_slow_service(speed);
        Uuid::new_v4()
    });

    assert!(start.elapsed() < speed);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unhandled_error_escapes_on_subscribing_thread() {
    let speed = Duration::from_millis(1000);
    let raised = CustomError::unique();
    let start = Instant::now();

    let unhandled = run_and_catch(failing_callable(speed, raised.clone()))
        .expect("error should escape a bare subscription");

    assert!(start.elapsed() >= speed);
    assert_eq!(unhandled.error().downcast_ref::<CustomError>(), Some(&raised));
}

#[test]
fn unhandled_error_from_deferred_inner_observable() {
    let speed = Duration::from_millis(1000);
    let start = Instant::now();

    let unhandled = run_and_catch(Observable::defer(move || {
        failing_callable(speed, CustomError::new("inner observable failed"))
    }))
    .expect("error should escape a bare subscription");

    assert!(start.elapsed() >= speed);
    assert!(unhandled.error().downcast_ref::<CustomError>().is_some());
}

#[test]
fn threaded_error_does_not_reach_subscribing_thread() {
    let speed = Duration::from_millis(1000);
    let start = Instant::now();

    let escaped = run_and_catch(
        Observable::defer(move || failing_callable(speed, CustomError::unique()))
            .subscribe_on(scheduler::io()),
    );

    assert!(escaped.is_none());
    assert!(start.elapsed() < speed);
}

#[test]
fn bare_subscription_blocks_for_inline_producer() {
    let speed = Duration::from_millis(1000);
    let start = Instant::now();

    let _subscription = slow_uuid(speed).run();
    assert!(start.elapsed() >= speed);
}

#[test]
fn threaded_subscription_returns_immediately() {
    let speed = Duration::from_millis(1000);
    let start = Instant::now();

    let _subscription = Observable::defer(move || slow_uuid(speed))
        .subscribe_on(scheduler::io())
        .run();
    assert!(start.elapsed() < speed);
}

#[test]
fn observe_on_keeps_producer_on_subscribing_thread() {
    let speed = Duration::from_millis(1000);
    let start = Instant::now();

    let _subscription = slow_uuid(speed).observe_on(scheduler::io()).run();
    assert!(start.elapsed() >= speed);
}

#[test]
fn observe_on_moves_slow_observer_off_subscribing_thread() {
    let speed = Duration::from_millis(1000);
    let delivered = Arc::new(AtomicUsize::new(0));
    let delivered_c = Arc::clone(&delivered);
    let start = Instant::now();

    let _subscription = Observable::from_fn(Uuid::new_v4)
        .observe_on(scheduler::io())
        .do_on_next(move |_| {
            call_slow_service(speed);
            delivered_c.fetch_add(1, Ordering::SeqCst);
        })
        .run();

    assert!(start.elapsed() < speed);
    assert_eq!(delivered.load(Ordering::SeqCst), 0);
}

#[test]
fn subscribe_on_moves_slow_subscriber_off_subscribing_thread() {
    let speed = Duration::from_millis(1000);
    let (tx, rx) = std::sync::mpsc::channel();
    let start = Instant::now();

    Observable::from_fn(Uuid::new_v4)
        .subscribe_on(scheduler::io())
        .subscribe(Subscriber::new(
            move |_| {
                call_slow_service(speed);
                let _ = tx.send(thread::current().name().map(str::to_owned));
            },
            |e| panic!("unexpected error {e}"),
            || {},
        ));

    assert!(start.elapsed() < speed);
    let name = rx.recv_timeout(speed * 5).unwrap().unwrap();
    assert!(name.starts_with("rxlite-io"), "subscriber ran on {name}");
}

#[test]
fn unsubscribe_stops_threaded_producer() {
    let (tx, rx) = std::sync::mpsc::channel();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_c = Arc::clone(&seen);

    let subscription = generate_u32_observable(10_000, tx)
        .map(|v| v * 2)
        .subscribe(Subscriber::on_next(move |_| {
            seen_c.fetch_add(1, Ordering::SeqCst);
        }));

    thread::sleep(Duration::from_millis(50));
    subscription.unsubscribe();

    let last = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(last < 10_000, "producer kept emitting until {last}");
    let frozen = seen.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(seen.load(Ordering::SeqCst), frozen);
}
