use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tracing::trace;

use crate::observer::Observer;
use crate::scheduler::SchedulerRef;
use crate::subscription::shared::SharedSubscription;
use crate::subscription::subscribe::{Subscribeable, Subscriber, Subscription};

use super::Observable;

struct RepeatState<S, T> {
    source: Arc<S>,
    remaining: AtomicUsize,
    /// Pending resubscription requests. Only the caller that raises it from
    /// zero runs the loop, so synchronous sources are resubscribed iteratively.
    wip: AtomicUsize,
    downstream: Mutex<Subscriber<T>>,
    /// Holds the teardown of the running pass.
    current: SharedSubscription,
    scheduler: Option<SchedulerRef>,
}

impl<S, T> RepeatState<S, T>
where
    S: Subscribeable<ObsType = T> + Send + Sync + 'static,
    T: Send + 'static,
{
    fn resubscribe(self: &Arc<Self>) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            if self.current.is_closed() {
                return;
            }
            let remaining = self.remaining.load(Ordering::Acquire);
            if remaining == 0 {
                self.downstream.lock().complete();
                return;
            }
            self.remaining.store(remaining - 1, Ordering::Release);
            trace!(remaining = remaining - 1, "repeat pass starting");
            self.subscribe_pass();

            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }

    fn subscribe_pass(self: &Arc<Self>) {
        let state_n = Arc::clone(self);
        let state_e = Arc::clone(self);
        let state_c = Arc::clone(self);
        let inner = Subscriber::new(
            move |v| state_n.downstream.lock().next(v),
            move |e| state_e.downstream.lock().error(e),
            move || state_c.resubscribe(),
        );
        let pass = inner.teardown();
        self.current.replace(pass.subscription());

        match &self.scheduler {
            None => {
                self.source.subscribe(inner);
            }
            Some(scheduler) => {
                let source = Arc::clone(&self.source);
                let task = scheduler.schedule(Box::new(move || {
                    source.subscribe(inner);
                }));
                pass.add(task);
            }
        }
    }
}

pub(super) fn repeat<S, T>(source: S, n: usize, scheduler: Option<SchedulerRef>) -> Observable<T>
where
    S: Subscribeable<ObsType = T> + Send + Sync + 'static,
    T: Send + 'static,
{
    let source = Arc::new(source);
    Observable::new(move |o| {
        let current = SharedSubscription::new();
        o.add(current.subscription());
        let state = Arc::new(RepeatState {
            source: Arc::clone(&source),
            remaining: AtomicUsize::new(n),
            wip: AtomicUsize::new(0),
            downstream: Mutex::new(o),
            current,
            scheduler: scheduler.clone(),
        });
        state.resubscribe();
        Subscription::nil()
    })
}
