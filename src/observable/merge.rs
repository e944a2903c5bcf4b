use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;

use crate::observer::Observer;
use crate::subscription::subscribe::{Subscribeable, Subscriber, Subscription};

use super::Observable;

impl<T: Send + 'static> Observable<T> {
    /// Subscribes to every source at once and forwards all their items.
    ///
    /// Items keep their order per source; the interleaving between sources
    /// follows arrival. The merged stream completes once every source
    /// completed, immediately if there are none. The first error is forwarded
    /// and cancels the sources that are still running.
    pub fn merge<I>(sources: I) -> Observable<T>
    where
        I: IntoIterator<Item = Observable<T>>,
    {
        let sources: Arc<Vec<Observable<T>>> = Arc::new(sources.into_iter().collect());

        Observable::new(move |mut o| {
            if sources.is_empty() {
                o.complete();
                return Subscription::nil();
            }
            let teardown = o.teardown();
            let remaining = Arc::new(AtomicUsize::new(sources.len()));
            let o = Arc::new(Mutex::new(o));

            for source in sources.iter() {
                if teardown.is_closed() {
                    break;
                }
                let o_next = Arc::clone(&o);
                let o_error = Arc::clone(&o);
                let o_complete = Arc::clone(&o);
                let remaining = Arc::clone(&remaining);

                let inner = Subscriber::new(
                    move |v| o_next.lock().next(v),
                    move |e| o_error.lock().error(e),
                    move || {
                        if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                            o_complete.lock().complete();
                        }
                    },
                );
                teardown.add(inner.teardown().subscription());
                source.subscribe(inner);
            }
            Subscription::nil()
        })
    }
}
