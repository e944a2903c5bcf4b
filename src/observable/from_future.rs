use std::future::Future;

use futures::{
    channel::oneshot,
    executor::block_on,
    future::{select, BoxFuture, Either, Shared},
    FutureExt,
};
use tracing::trace;

use crate::errors::{into_stream_error, BoxError, ObservableError, StreamError};
use crate::observer::Observer;
use crate::scheduler::SchedulerRef;
use crate::subscription::subscribe::{Subscription, UnsubscribeLogic};

use super::{Observable, ObservableExt};

type SharedResult<T> = Shared<BoxFuture<'static, Result<T, StreamError>>>;

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Bridges a future into an observable.
    ///
    /// The subscribing thread blocks until the future resolves: `Ok(v)` is
    /// emitted followed by `complete`, `Err(e)` as the error. The future runs
    /// at most once and its outcome is shared, so every subscription, earlier
    /// or later, receives the same value or error. Cancelling a subscription
    /// abandons that subscription's wait only; the future itself is dropped
    /// together with the last clone of the observable.
    pub fn from_future<F, E>(future: F) -> Observable<T>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let shared: SharedResult<T> = future
            .map(|result| result.map_err(into_stream_error))
            .boxed()
            .shared();

        Observable::new(move |mut o| {
            let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
            o.add(Subscription::new(UnsubscribeLogic::Logic(Box::new(
                move || {
                    let _ = cancel_tx.send(());
                },
            ))));

            match block_on(select(shared.clone(), cancel_rx)) {
                Either::Left((Ok(v), _)) => {
                    o.next(v);
                    o.complete();
                }
                Either::Left((Err(e), _)) => o.error(e),
                Either::Right((Ok(()), _)) => trace!("future wait cancelled"),
                Either::Right((Err(_), _)) => {
                    o.error(ObservableError::FutureCancelled.into_stream());
                }
            }
            Subscription::nil()
        })
    }

    /// [`from_future`](Self::from_future) with the wait moved to `scheduler`.
    pub fn from_future_on<F, E>(future: F, scheduler: SchedulerRef) -> Observable<T>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Observable::from_future(future).subscribe_on(scheduler)
    }
}
