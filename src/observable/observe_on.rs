use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;

use crate::observer::Notification;
use crate::scheduler::SchedulerRef;
use crate::subscription::subscribe::{Subscribeable, Subscriber};

use super::Observable;

struct ObserveOnState<T> {
    queue: Mutex<VecDeque<Notification<T>>>,
    /// Notifications pushed but not yet accounted for by a drain.
    wip: AtomicUsize,
    downstream: Mutex<Subscriber<T>>,
    scheduler: SchedulerRef,
}

impl<T: Send + 'static> ObserveOnState<T> {
    fn push(self: &Arc<Self>, notification: Notification<T>) {
        self.queue.lock().push_back(notification);
        if self.wip.fetch_add(1, Ordering::AcqRel) == 0 {
            let state = Arc::clone(self);
            // A drain that runs after cancellation finds the downstream
            // closed and discards the queue, so the task is not tracked.
            let _ = self.scheduler.schedule(Box::new(move || state.drain()));
        }
    }

    fn drain(&self) {
        let mut missed = 1;
        loop {
            loop {
                let Some(notification) = self.queue.lock().pop_front() else {
                    break;
                };
                let mut downstream = self.downstream.lock();
                if downstream.is_closed() {
                    self.queue.lock().clear();
                    break;
                }
                let terminal = notification.is_terminal();
                notification.deliver(&mut *downstream);
                if terminal {
                    self.queue.lock().clear();
                }
            }
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }
}

pub(super) fn observe_on<S, T>(source: S, scheduler: SchedulerRef) -> Observable<T>
where
    S: Subscribeable<ObsType = T> + Send + Sync + 'static,
    T: Send + 'static,
{
    Observable::new(move |o| {
        let state = Arc::new(ObserveOnState {
            queue: Mutex::new(VecDeque::new()),
            wip: AtomicUsize::new(0),
            downstream: Mutex::new(o),
            scheduler: Arc::clone(&scheduler),
        });
        let state_e = Arc::clone(&state);
        let state_c = Arc::clone(&state);

        // The source keeps its own teardown: it terminates before the queued
        // notifications reach the downstream, which must stay open meanwhile.
        let u = Subscriber::new(
            move |v| state.push(Notification::Next(v)),
            move |e| state_e.push(Notification::Error(e)),
            move || state_c.push(Notification::Complete),
        );
        source.subscribe(u)
    })
}
