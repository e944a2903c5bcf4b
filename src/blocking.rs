//! Pull-style access to the result of an observable.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::errors::{ObservableError, StreamError};
use crate::observable::Observable;
use crate::subscription::shared::SharedSubscription;
use crate::subscription::subscribe::{Subscribeable, Subscriber};

#[derive(Clone, Copy, Debug)]
enum Pull {
    Single,
    First,
    Last,
}

struct SlotState<T> {
    value: Option<T>,
    outcome: Option<Result<(), StreamError>>,
}

/// The slot a blocking pull waits on. Producer threads write into it, the
/// calling thread reads from it once a terminal outcome is recorded.
struct BlockingResult<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> BlockingResult<T> {
    fn new() -> Self {
        BlockingResult {
            state: Mutex::new(SlotState {
                value: None,
                outcome: None,
            }),
            ready: Condvar::new(),
        }
    }

    /// Records an item. Returns `true` when the pull has its answer and the
    /// source should be cancelled.
    fn accept(&self, v: T, pull: Pull) -> bool {
        let mut state = self.state.lock();
        if state.outcome.is_some() {
            return true;
        }
        match pull {
            Pull::Single if state.value.is_some() => {
                state.value = None;
                state.outcome = Some(Err(ObservableError::TooManyElements.into_stream()));
            }
            Pull::Single | Pull::Last => {
                state.value = Some(v);
                return false;
            }
            Pull::First => {
                state.value = Some(v);
                state.outcome = Some(Ok(()));
            }
        }
        self.ready.notify_all();
        true
    }

    /// Records the terminal outcome unless one is already known.
    fn finish(&self, outcome: Result<(), StreamError>) {
        let mut state = self.state.lock();
        if state.outcome.is_none() {
            state.outcome = Some(outcome);
            self.ready.notify_all();
        }
    }

    fn wait(&self) -> Result<T, StreamError> {
        let mut state = self.state.lock();
        while state.outcome.is_none() {
            self.ready.wait(&mut state);
        }
        match state.outcome.take() {
            Some(Err(e)) => Err(e),
            _ => state
                .value
                .take()
                .ok_or_else(|| ObservableError::NoElements.into_stream()),
        }
    }
}

/// Owned by the pull's subscriber. Dropping it before a terminal outcome was
/// recorded (a producer that panicked, or one that let its subscriber go)
/// releases the waiting caller with [`ObservableError::Abandoned`].
struct AbandonGuard<T> {
    result: Arc<BlockingResult<T>>,
}

impl<T> Drop for AbandonGuard<T> {
    fn drop(&mut self) {
        self.result.finish(Err(ObservableError::Abandoned.into_stream()));
    }
}

/// Blocking view of an observable, created by
/// [`to_blocking`](crate::observable::ObservableExt::to_blocking).
///
/// Creating it starts nothing. Each pull method subscribes, blocks the calling
/// thread until the answer is known, and re-raises an error from any thread
/// as the `Err` of the call.
#[must_use = "a blocking observable does nothing until single, first or last is called"]
pub struct BlockingObservable<T> {
    source: Observable<T>,
}

impl<T: Send + 'static> BlockingObservable<T> {
    pub(crate) fn new(source: Observable<T>) -> Self {
        BlockingObservable { source }
    }

    /// Returns the only item of the stream.
    ///
    /// # Errors
    ///
    /// [`ObservableError::NoElements`] if the stream completed empty,
    /// [`ObservableError::TooManyElements`] as soon as a second item arrives
    /// (the source is cancelled then), or the stream's own error.
    pub fn single(&self) -> Result<T, StreamError> {
        self.pull(Pull::Single)
    }

    /// Returns the first item and cancels the source.
    ///
    /// # Errors
    ///
    /// [`ObservableError::NoElements`] if the stream completed empty, or the
    /// stream's own error.
    pub fn first(&self) -> Result<T, StreamError> {
        self.pull(Pull::First)
    }

    /// Returns the last item once the stream completed.
    ///
    /// # Errors
    ///
    /// [`ObservableError::NoElements`] if the stream completed empty, or the
    /// stream's own error.
    pub fn last(&self) -> Result<T, StreamError> {
        self.pull(Pull::Last)
    }

    fn pull(&self, pull: Pull) -> Result<T, StreamError> {
        let result = Arc::new(BlockingResult::new());
        let teardown = SharedSubscription::new();

        let r_next = Arc::clone(&result);
        let r_error = Arc::clone(&result);
        let guard = AbandonGuard {
            result: Arc::clone(&result),
        };
        let cancel = teardown.clone();

        let mut subscriber = Subscriber::new(
            move |v| {
                if r_next.accept(v, pull) {
                    cancel.unsubscribe();
                }
            },
            move |e| r_error.finish(Err(e)),
            move || guard.result.finish(Ok(())),
        );
        subscriber.set_teardown(teardown);

        let _subscription = self.source.subscribe(subscriber);
        result.wait()
    }
}
