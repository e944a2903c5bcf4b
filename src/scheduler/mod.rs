//! Execution contexts that decide where and when observable work runs.
//!
//! A [`Scheduler`] accepts units of [`Work`] and returns a [`Subscription`] that
//! cancels the work if it has not started yet. Four implementations are
//! provided:
//!
//! - [`ImmediateScheduler`] runs work inline on the calling thread.
//! - [`PooledScheduler`] runs work on an elastic, named thread pool. The shared
//!   instance returned by [`io`] is the default choice for blocking work.
//! - [`NewThreadScheduler`] spawns a dedicated thread per unit of work.
//! - [`TokioScheduler`] hands work to a `tokio` runtime.

mod immediate;
mod new_thread;
mod pool;
mod tokio_scheduler;

use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    time::{Duration, Instant},
};

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use tracing::{error, trace};

use crate::errors::UnhandledError;
use crate::subscription::subscribe::{Subscription, UnsubscribeLogic, Unsubscribeable};

pub use immediate::ImmediateScheduler;
pub use new_thread::NewThreadScheduler;
pub use pool::PooledScheduler;
pub use tokio_scheduler::TokioScheduler;

/// A unit of work accepted by a scheduler.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to a scheduler, as accepted by the scheduling operators.
pub type SchedulerRef = Arc<dyn Scheduler>;

/// An execution context.
pub trait Scheduler: Send + Sync {
    /// Name used in log output.
    fn name(&self) -> &str;

    /// Runs `work` as soon as the scheduler allows. Unsubscribing the returned
    /// subscription before the work started prevents it from running.
    fn schedule(&self, work: Work) -> Subscription;

    /// Runs `work` once `delay` elapsed.
    ///
    /// The default implementation schedules a task that sleeps on a
    /// [`CancelToken`], so cancelling wakes the waiting thread right away.
    fn schedule_after(&self, delay: Duration, work: Work) -> Subscription {
        let token = CancelToken::new();
        let waiter = token.clone();
        let task = self.schedule(Box::new(move || {
            if !waiter.wait_timeout(delay) {
                work();
            }
        }));
        Subscription::new(UnsubscribeLogic::Logic(Box::new(move || {
            token.cancel();
            task.unsubscribe();
        })))
    }
}

#[derive(Default)]
struct CancelInner {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

/// One-shot cancellation flag that threads can block on.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token and wakes every thread waiting on it.
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        if !*cancelled {
            *cancelled = true;
            self.inner.signal.notify_all();
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Blocks for at most `timeout`. Returns `true` if the token was cancelled
    /// before the time ran out.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.wait_until(deadline)
    }

    /// Blocks until `deadline`. Returns `true` if the token was cancelled first.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            if self
                .inner
                .signal
                .wait_until(&mut cancelled, deadline)
                .timed_out()
            {
                break;
            }
        }
        *cancelled
    }
}

impl From<CancelToken> for Subscription {
    fn from(token: CancelToken) -> Self {
        Subscription::new(UnsubscribeLogic::Logic(Box::new(move || token.cancel())))
    }
}

/// Runs `work` unless `token` was cancelled. A panic is contained and logged so
/// that it does not take a worker thread down with it.
pub(crate) fn run_guarded(work: Work, token: &CancelToken, scheduler: &str) {
    if token.is_cancelled() {
        trace!(scheduler, "skipping cancelled work");
        return;
    }
    if let Err(payload) = catch_unwind(AssertUnwindSafe(work)) {
        error!(
            scheduler,
            thread = std::thread::current().name().unwrap_or("<unnamed>"),
            panic = %panic_message(payload.as_ref()),
            "scheduled work panicked"
        );
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(unhandled) = payload.downcast_ref::<UnhandledError>() {
        unhandled.to_string()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

static IMMEDIATE: Lazy<SchedulerRef> = Lazy::new(|| Arc::new(ImmediateScheduler));
static IO: Lazy<SchedulerRef> = Lazy::new(|| Arc::new(PooledScheduler::with_defaults()));
static NEW_THREAD: Lazy<SchedulerRef> = Lazy::new(|| Arc::new(NewThreadScheduler::new()));

/// Scheduler that runs work inline on the calling thread.
#[must_use]
pub fn immediate() -> SchedulerRef {
    Arc::clone(&IMMEDIATE)
}

/// Process-wide elastic pool for blocking and I/O bound work. Its threads are
/// named `rxlite-io-<n>` and retire after sixty seconds without work.
#[must_use]
pub fn io() -> SchedulerRef {
    Arc::clone(&IO)
}

/// Scheduler that starts a new thread for every unit of work.
#[must_use]
pub fn new_thread() -> SchedulerRef {
    Arc::clone(&NEW_THREAD)
}

/// Wraps a `tokio` runtime handle into a scheduler.
#[must_use]
pub fn from_tokio(handle: ::tokio::runtime::Handle) -> SchedulerRef {
    Arc::new(TokioScheduler::new(handle))
}
