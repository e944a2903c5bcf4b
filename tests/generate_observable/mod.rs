use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, Mutex,
    },
    thread,
    time::Duration,
};

use rxlite::{Observable, Observer, Subscriber, Subscription, UnsubscribeLogic};
use uuid::Uuid;

/// Stands in for a slow remote call.
pub fn call_slow_service(speed: Duration) {
    thread::sleep(speed);
}

/// An observable that takes `speed` to produce one random UUID.
pub fn slow_uuid(speed: Duration) -> Observable<Uuid> {
    Observable::from_fn(move || {
        call_slow_service(speed);
        Uuid::new_v4()
    })
}

/// Emits `0..=end` from its own thread, one value per millisecond, until the
/// subscription is cancelled. Sends the last value it tried to emit to
/// `last_emit` when the thread finishes.
pub fn generate_u32_observable(end: u32, last_emit: mpsc::Sender<u32>) -> Observable<u32> {
    let last_emit = Arc::new(Mutex::new(last_emit));

    Observable::new(move |mut o: Subscriber<_>| {
        let done = Arc::new(AtomicBool::new(false));
        let done_c = Arc::clone(&done);
        let last_emit = Arc::clone(&last_emit);

        thread::spawn(move || {
            let mut last = 0;
            for i in 0..=end {
                if done.load(Ordering::SeqCst) {
                    break;
                }
                last = i;
                o.next(i);
                // Important. Give cancellation a chance between emissions.
                thread::sleep(Duration::from_millis(1));
            }
            o.complete();
            if let Ok(tx) = last_emit.lock() {
                let _ = tx.send(last);
            }
        });

        Subscription::new(UnsubscribeLogic::Logic(Box::new(move || {
            done_c.store(true, Ordering::SeqCst);
        })))
    })
}
