use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tracing::debug;

use crate::errors::{ObservableError, StreamError};
use crate::observer::Observer;
use crate::scheduler::SchedulerRef;
use crate::subscription::shared::SharedSubscription;
use crate::subscription::subscribe::{Subscribeable, Subscriber};

use super::Observable;

/// When the timer of [`timeout_with`](super::ObservableExt::timeout_with) is
/// measured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeoutMode {
    /// The timer starts at subscription and restarts once the downstream has
    /// handled an item. Time spent in the downstream does not count.
    #[default]
    Idle,
    /// A single timer runs from subscription until the stream terminates.
    Deadline,
}

const DONE: u64 = u64::MAX;

struct TimeoutState<T> {
    /// Number of items seen so far, or `DONE` once a terminal was delivered.
    index: AtomicU64,
    downstream: Mutex<Subscriber<T>>,
    upstream: SharedSubscription,
    timer: SharedSubscription,
    duration: Duration,
    scheduler: SchedulerRef,
    mode: TimeoutMode,
}

impl<T: Send + 'static> TimeoutState<T> {
    fn arm(self: &Arc<Self>, index: u64) {
        let state = Arc::clone(self);
        let task = self
            .scheduler
            .schedule_after(self.duration, Box::new(move || state.fire(index)));
        self.timer.replace(task);
    }

    fn fire(&self, index: u64) {
        if self
            .index
            .compare_exchange(index, DONE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        debug!(
            timeout_ms = u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX),
            scheduler = self.scheduler.name(),
            "timeout elapsed, cancelling upstream"
        );
        self.upstream.unsubscribe();
        self.downstream
            .lock()
            .error(ObservableError::Timeout(self.duration).into_stream());
    }

    fn on_next(self: &Arc<Self>, v: T) {
        match self.mode {
            TimeoutMode::Idle => {
                let index = self.index.load(Ordering::Acquire);
                if index == DONE
                    || self
                        .index
                        .compare_exchange(index, index + 1, Ordering::AcqRel, Ordering::Acquire)
                        .is_err()
                {
                    return;
                }
                // The bumped index already disarms the running timer.
                self.downstream.lock().next(v);
                if self.index.load(Ordering::Acquire) == index + 1 {
                    self.arm(index + 1);
                }
            }
            TimeoutMode::Deadline => {
                if self.index.load(Ordering::Acquire) != DONE {
                    self.downstream.lock().next(v);
                }
            }
        }
    }

    fn finish(&self, error: Option<StreamError>) {
        if self.index.swap(DONE, Ordering::AcqRel) == DONE {
            return;
        }
        self.timer.unsubscribe();
        let mut downstream = self.downstream.lock();
        match error {
            Some(e) => downstream.error(e),
            None => downstream.complete(),
        }
    }
}

pub(super) fn timeout<S, T>(
    source: S,
    duration: Duration,
    scheduler: SchedulerRef,
    mode: TimeoutMode,
) -> Observable<T>
where
    S: Subscribeable<ObsType = T> + Send + Sync + 'static,
    T: Send + 'static,
{
    Observable::new(move |o| {
        let timer = SharedSubscription::new();
        o.add(timer.subscription());

        let upstream = SharedSubscription::new();
        let state = Arc::new(TimeoutState {
            index: AtomicU64::new(0),
            downstream: Mutex::new(o),
            upstream,
            timer,
            duration,
            scheduler: Arc::clone(&scheduler),
            mode,
        });
        let state_n = Arc::clone(&state);
        let state_e = Arc::clone(&state);
        let state_c = Arc::clone(&state);
        let mut u = Subscriber::new(
            move |v| state_n.on_next(v),
            move |e| state_e.finish(Some(e)),
            move || state_c.finish(None),
        );
        u.set_teardown(state.upstream.clone());

        // Armed before subscribing: the source may block this thread until
        // the timer cancels it.
        state.arm(0);
        source.subscribe(u)
    })
}
