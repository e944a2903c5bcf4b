use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use rxlite::{scheduler, Observable, ObservableError, ObservableExt};
use uuid::Uuid;

mod custom_error;
mod generate_observable;

use custom_error::CustomError;
use generate_observable::{call_slow_service, slow_uuid};

#[test]
fn repeat_without_pull_runs_nothing() {
    let speed = Duration::from_millis(1000);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_c = Arc::clone(&calls);
    let start = Instant::now();

    let _blocking = Observable::from_fn(move || {
        calls_c.fetch_add(1, Ordering::SeqCst);
        call_slow_service(speed);
        Uuid::new_v4()
    })
    .repeat(10)
    .to_blocking();

    assert!(start.elapsed() < speed);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn repeat_runs_passes_sequentially() {
    let speed = Duration::from_millis(100);
    let count = 10;
    let start = Instant::now();

    let ids = slow_uuid(speed)
        .repeat(count)
        .map(|id| id.to_string())
        .to_list()
        .to_blocking()
        .single()
        .unwrap();

    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), count);
    assert!(start.elapsed() >= speed * count as u32);
}

#[test]
fn repeat_zero_completes_without_subscribing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_c = Arc::clone(&calls);
    let start = Instant::now();

    let ids = Observable::defer(move || {
        calls_c.fetch_add(1, Ordering::SeqCst);
        slow_uuid(Duration::from_millis(500))
    })
    .repeat(0)
    .to_list()
    .to_blocking()
    .single()
    .unwrap();

    assert!(ids.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn repeat_stops_at_failing_transformation() {
    let speed = Duration::from_millis(200);
    let start = Instant::now();
    let passes = Arc::new(AtomicUsize::new(0));
    let passes_c = Arc::clone(&passes);

    let err = Observable::defer(move || {
        passes_c.fetch_add(1, Ordering::SeqCst);
        slow_uuid(speed)
    })
    .try_map(|_| Err::<String, _>(CustomError::new("transformation failed")))
    .repeat(5)
    .to_list()
    .to_blocking()
    .single()
    .unwrap_err();

    assert!(err.downcast_ref::<CustomError>().is_some());
    assert_eq!(passes.load(Ordering::SeqCst), 1);
    assert!(start.elapsed() >= speed);
}

#[test]
fn repeat_of_subscribe_on_waits_for_each_pass() {
    let speed = Duration::from_millis(100);
    let count = 5;
    let start = Instant::now();

    let ids = Observable::defer(move || slow_uuid(speed).subscribe_on(scheduler::io()))
        .repeat(count)
        .to_list()
        .to_blocking()
        .single()
        .unwrap();

    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), count);
    assert!(start.elapsed() >= speed * count as u32);
}

#[test]
fn repeat_of_observe_on_waits_for_each_pass() {
    let speed = Duration::from_millis(100);
    let count = 5;
    let start = Instant::now();

    let ids = slow_uuid(speed)
        .observe_on(scheduler::io())
        .repeat(count)
        .to_list()
        .to_blocking()
        .single()
        .unwrap();

    assert_eq!(ids.len(), count);
    assert!(start.elapsed() >= speed * count as u32);
}

#[test]
fn repeat_on_scheduler_with_threaded_source() {
    let speed = Duration::from_millis(100);
    let count = 5;
    let start = Instant::now();

    let ids = slow_uuid(speed)
        .subscribe_on(scheduler::io())
        .repeat_on(count, scheduler::io())
        .to_list()
        .to_blocking()
        .single()
        .unwrap();

    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), count);
    assert!(start.elapsed() >= speed * count as u32);
}

#[test]
fn repeated_collection_then_merge_runs_concurrently() {
    let speed = Duration::from_millis(1000);
    let count = 50;
    let observables = Arc::new(Mutex::new(Vec::new()));
    let observables_c = Arc::clone(&observables);
    let slow = slow_uuid(speed);

    Observable::from_fn(move || {
        observables_c
            .lock()
            .unwrap()
            .push(slow.clone().subscribe_on(scheduler::io()));
    })
    .repeat(count)
    .to_list()
    .to_blocking()
    .single()
    .unwrap();

    let start = Instant::now();
    let sources = std::mem::take(&mut *observables.lock().unwrap());
    let ids = Observable::merge(sources)
        .map(|id| id.to_string())
        .to_list()
        .to_blocking()
        .single()
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), count);
    assert!(elapsed >= speed, "finished too early: {elapsed:?}");
    assert!(
        elapsed < speed * 2 - speed / 2,
        "sources did not run concurrently: {elapsed:?}"
    );
}

#[test]
fn repeat_error_is_not_cardinality_error() {
    let err = Observable::<Uuid>::error(CustomError::new("first pass failed"))
        .repeat(3)
        .to_blocking()
        .single()
        .unwrap_err();
    assert!(err.downcast_ref::<ObservableError>().is_none());
    assert_eq!(err.to_string(), "first pass failed");
}
