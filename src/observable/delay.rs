use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::trace;

use crate::errors::StreamError;
use crate::observer::{Notification, Observer};
use crate::scheduler::{CancelToken, SchedulerRef};
use crate::subscription::subscribe::{Subscribeable, Subscriber};

use super::Observable;

struct DelayState<T> {
    queue: Mutex<VecDeque<(Instant, Notification<T>)>>,
    wip: AtomicUsize,
    downstream: Mutex<Subscriber<T>>,
    /// Cancelled when the downstream goes away or an error overtakes the queue.
    cancel: CancelToken,
    delay: Duration,
    scheduler: SchedulerRef,
}

impl<T: Send + 'static> DelayState<T> {
    fn push(self: &Arc<Self>, notification: Notification<T>) {
        let due = Instant::now() + self.delay;
        self.queue.lock().push_back((due, notification));
        if self.wip.fetch_add(1, Ordering::AcqRel) == 0 {
            let state = Arc::clone(self);
            let _ = self.scheduler.schedule(Box::new(move || state.drain()));
        }
    }

    fn fail(&self, e: StreamError) {
        self.queue.lock().clear();
        self.cancel.cancel();
        self.downstream.lock().error(e);
    }

    fn drain(&self) {
        let mut missed = 1;
        loop {
            loop {
                let Some(due) = self.queue.lock().front().map(|(due, _)| *due) else {
                    break;
                };
                if self.cancel.wait_until(due) {
                    trace!("delay drain cancelled");
                    return;
                }
                let Some((_, notification)) = self.queue.lock().pop_front() else {
                    break;
                };
                notification.deliver(&mut *self.downstream.lock());
            }
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }
}

pub(super) fn delay<S, T>(source: S, delay: Duration, scheduler: SchedulerRef) -> Observable<T>
where
    S: Subscribeable<ObsType = T> + Send + Sync + 'static,
    T: Send + 'static,
{
    Observable::new(move |o| {
        let cancel = CancelToken::new();
        o.add(cancel.clone().into());
        let state = Arc::new(DelayState {
            queue: Mutex::new(VecDeque::new()),
            wip: AtomicUsize::new(0),
            downstream: Mutex::new(o),
            cancel,
            delay,
            scheduler: Arc::clone(&scheduler),
        });
        let state_e = Arc::clone(&state);
        let state_c = Arc::clone(&state);

        let u = Subscriber::new(
            move |v| state.push(Notification::Next(v)),
            move |e| state_e.fail(e),
            move || state_c.push(Notification::Complete),
        );
        source.subscribe(u)
    })
}
