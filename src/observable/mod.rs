//! The `observable` module provides the building blocks for creating and manipulating
//! observables, allowing for reactive programming in Rust.

mod delay;
mod from_future;
mod merge;
mod observe_on;
mod repeat;
mod timeout;

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::blocking::BlockingObservable;
use crate::errors::{into_stream_error, BoxError, StreamError};
use crate::observer::Observer;
use crate::scheduler::SchedulerRef;
use crate::subscription::shared::SharedSubscription;
use crate::subscription::subscribe::{Subscribeable, Subscriber, Subscription};

pub use timeout::TimeoutMode;

type SubscribeFn<T> = dyn Fn(Subscriber<T>) -> Subscription + Send + Sync;

/// The `Observable` struct represents a cold source of values that can be observed
/// and transformed.
///
/// An `Observable` is only a description of work: nothing runs until it is
/// subscribed, and every subscription runs the producer again from the start.
/// Operators never modify the receiver, they wrap it into a new `Observable`.
/// Cloning is cheap and clones share the same producer.
///
/// # Example: synchronous `Observable`
///
/// Without a scheduler the whole chain runs inline on the subscribing thread, so
/// `subscribe` returns only after the producer finished.
///
/// ```no_run
/// use rxlite::{Observable, ObservableExt, Observer, Subscribeable, Subscriber, Subscription};
///
/// let observable = Observable::new(|mut subscriber| {
///     for i in 1..=10 {
///         subscriber.next(i);
///     }
///     subscriber.complete();
///     Subscription::nil()
/// });
///
/// let observer = Subscriber::new(
///     |v| println!("Emitted {}", v),
///     |e| eprintln!("Failed: {}", e),
///     || println!("Completed"),
/// );
///
/// observable.map(|v| v * 2).subscribe(observer);
/// ```
///
/// # Example: moving work to a scheduler
///
/// `subscribe_on` runs the producer on a scheduler thread and `to_blocking`
/// brings the result back to the caller.
///
/// ```no_run
/// use std::{thread, time::Duration};
///
/// use rxlite::{scheduler, Observable, ObservableExt};
///
/// let answer = Observable::from_callable(|| {
///     thread::sleep(Duration::from_millis(100));
///     Ok::<_, std::io::Error>(42)
/// })
/// .subscribe_on(scheduler::io())
/// .to_blocking()
/// .single()
/// .unwrap();
///
/// assert_eq!(answer, 42);
/// ```
pub struct Observable<T> {
    subscribe_fn: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Observable {
            subscribe_fn: Arc::clone(&self.subscribe_fn),
        }
    }
}

impl<T: 'static> Observable<T> {
    /// Creates a new `Observable` with the provided subscribe function.
    ///
    /// The subscribe function (`sf`) runs once per subscription. It pushes values
    /// into the `Subscriber` with `next`, finishes with `complete` or `error`,
    /// and may do so from any thread. It returns a `Subscription` that releases
    /// whatever the producer started. Producers that block can also register
    /// cleanup directly with [`Subscriber::add`], which is honored even while
    /// the subscribe function is still running.
    pub fn new(sf: impl Fn(Subscriber<T>) -> Subscription + Send + Sync + 'static) -> Self {
        Observable {
            subscribe_fn: Arc::new(sf),
        }
    }

    /// Emits the value returned by `f` followed by `complete`, or only `error`
    /// if `f` fails. `f` runs on the subscribing thread, once per subscription.
    ///
    /// The concrete error type of `E` stays reachable through
    /// `StreamError::downcast_ref`.
    pub fn from_callable<F, E>(f: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Observable::new(move |mut o| {
            if o.is_closed() {
                return Subscription::nil();
            }
            match f() {
                Ok(v) => {
                    o.next(v);
                    o.complete();
                }
                Err(e) => o.error(into_stream_error(e)),
            }
            Subscription::nil()
        })
    }

    /// Infallible version of [`from_callable`](Self::from_callable).
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Observable::new(move |mut o| {
            if o.is_closed() {
                return Subscription::nil();
            }
            o.next(f());
            o.complete();
            Subscription::nil()
        })
    }

    /// Calls `factory` for every subscription and subscribes to the observable
    /// it returns. The factory never runs without a subscription.
    pub fn defer<F>(factory: F) -> Self
    where
        F: Fn() -> Observable<T> + Send + Sync + 'static,
    {
        Observable::new(move |o| factory().subscribe(o))
    }

    /// Fallible version of [`defer`](Self::defer). A factory error is delivered
    /// to the subscriber as `error`.
    pub fn try_defer<F, E>(factory: F) -> Self
    where
        F: Fn() -> Result<Observable<T>, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Observable::new(move |mut o| match factory() {
            Ok(observable) => observable.subscribe(o),
            Err(e) => {
                o.error(into_stream_error(e));
                Subscription::nil()
            }
        })
    }

    /// Completes without emitting anything.
    pub fn empty() -> Self {
        Observable::new(|mut o| {
            o.complete();
            Subscription::nil()
        })
    }

    /// Fails every subscriber with `e`.
    pub fn error<E: Into<BoxError>>(e: E) -> Self {
        let e = into_stream_error(e);
        Observable::new(move |mut o| {
            o.error(Arc::clone(&e));
            Subscription::nil()
        })
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Emits a clone of `value` and completes.
    pub fn just(value: T) -> Self {
        Observable::new(move |mut o| {
            o.next(value.clone());
            o.complete();
            Subscription::nil()
        })
    }
}

impl<T: 'static> Subscribeable for Observable<T> {
    type ObsType = T;

    fn subscribe(&self, s: Subscriber<Self::ObsType>) -> Subscription {
        let teardown = s.teardown();
        let producer = (self.subscribe_fn)(s);
        teardown.add(producer);
        teardown.subscription()
    }
}

/// Builds a `Subscriber` that forwards everything into a shared downstream
/// subscriber.
pub(crate) fn wrap_subscriber<T: 'static>(s: &Arc<Mutex<Subscriber<T>>>) -> Subscriber<T> {
    let s_next = Arc::clone(s);
    let s_error = Arc::clone(s);
    let s_complete = Arc::clone(s);

    Subscriber::new(
        move |v| s_next.lock().next(v),
        move |e| s_error.lock().error(e),
        move || s_complete.lock().complete(),
    )
}

/// Shares `o` between the callbacks of an upstream subscriber. The returned
/// token is `o`'s teardown, for operators that pass it on upstream.
fn share<T>(o: Subscriber<T>) -> (Arc<Mutex<Subscriber<T>>>, SharedSubscription) {
    let teardown = o.teardown();
    (Arc::new(Mutex::new(o)), teardown)
}

/// The `ObservableExt` trait provides a set of extension methods that can be applied
/// to observables to transform and manipulate their behavior.
///
/// Every operator returns a new `Observable` and leaves the receiver untouched.
pub trait ObservableExt<T: Send + 'static>: Subscribeable<ObsType = T> {
    /// Transforms the items emitted by the observable using a transformation
    /// function.
    fn map<U, F>(self, f: F) -> Observable<U>
    where
        Self: Sized + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
        U: 'static,
    {
        let f = Arc::new(f);
        Observable::new(move |o| {
            let f = Arc::clone(&f);
            let (o_shared, teardown) = share(o);
            let o_cloned_e = Arc::clone(&o_shared);
            let o_cloned_c = Arc::clone(&o_shared);

            let mut u = Subscriber::new(
                move |v| {
                    let t = f(v);
                    o_shared.lock().next(t);
                },
                move |observable_error| o_cloned_e.lock().error(observable_error),
                move || o_cloned_c.lock().complete(),
            );
            u.set_teardown(teardown);
            self.subscribe(u)
        })
    }

    /// Transforms items with a fallible function.
    ///
    /// The first `Err` is emitted as the stream's error and cancels upstream;
    /// nothing is emitted after it.
    fn try_map<U, E, F>(self, f: F) -> Observable<U>
    where
        Self: Sized + Send + Sync + 'static,
        F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
        E: Into<BoxError>,
        U: 'static,
    {
        let f = Arc::new(f);
        Observable::new(move |o| {
            let f = Arc::clone(&f);
            let (o_shared, teardown) = share(o);
            let o_cloned_e = Arc::clone(&o_shared);
            let o_cloned_c = Arc::clone(&o_shared);

            let mut u = Subscriber::new(
                move |v| match f(v) {
                    Ok(t) => o_shared.lock().next(t),
                    Err(e) => o_shared.lock().error(into_stream_error(e)),
                },
                move |observable_error| o_cloned_e.lock().error(observable_error),
                move || o_cloned_c.lock().complete(),
            );
            u.set_teardown(teardown);
            self.subscribe(u)
        })
    }

    /// Calls `f` with a reference to every item before passing the item on. `f`
    /// runs on whichever thread delivers the item.
    fn do_on_next<F>(self, f: F) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Observable::new(move |o| {
            let f = Arc::clone(&f);
            let (o_shared, teardown) = share(o);
            let o_cloned_e = Arc::clone(&o_shared);
            let o_cloned_c = Arc::clone(&o_shared);

            let mut u = Subscriber::new(
                move |v| {
                    f(&v);
                    o_shared.lock().next(v);
                },
                move |observable_error| o_cloned_e.lock().error(observable_error),
                move || o_cloned_c.lock().complete(),
            );
            u.set_teardown(teardown);
            self.subscribe(u)
        })
    }

    /// Fallible version of [`do_on_next`](Self::do_on_next). An `Err` replaces
    /// the item with an error and cancels upstream.
    fn try_do_on_next<E, F>(self, f: F) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
        F: Fn(&T) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let f = Arc::new(f);
        Observable::new(move |o| {
            let f = Arc::clone(&f);
            let (o_shared, teardown) = share(o);
            let o_cloned_e = Arc::clone(&o_shared);
            let o_cloned_c = Arc::clone(&o_shared);

            let mut u = Subscriber::new(
                move |v| match f(&v) {
                    Ok(()) => o_shared.lock().next(v),
                    Err(e) => o_shared.lock().error(into_stream_error(e)),
                },
                move |observable_error| o_cloned_e.lock().error(observable_error),
                move || o_cloned_c.lock().complete(),
            );
            u.set_teardown(teardown);
            self.subscribe(u)
        })
    }

    /// Subscribes to the source from a task on `scheduler`, so the producer
    /// body runs on a scheduler thread instead of the subscribing one.
    fn subscribe_on(self, scheduler: SchedulerRef) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
    {
        let source = Arc::new(self);
        Observable::new(move |o| {
            let source = Arc::clone(&source);
            scheduler.schedule(Box::new(move || {
                source.subscribe(o);
            }))
        })
    }

    /// Delivers every notification from a task on `scheduler`, in the order the
    /// source produced them. The source keeps running on its own thread.
    fn observe_on(self, scheduler: SchedulerRef) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
    {
        observe_on::observe_on(self, scheduler)
    }

    /// Subscribes to the source `n` times in sequence and completes after the
    /// last pass. `n == 0` completes without subscribing. An error stops the
    /// repetition.
    fn repeat(self, n: usize) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
    {
        repeat::repeat(self, n, None)
    }

    /// Like [`repeat`](Self::repeat), with every pass, the first included,
    /// subscribed from a task on `scheduler`.
    fn repeat_on(self, n: usize, scheduler: SchedulerRef) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
    {
        repeat::repeat(self, n, Some(scheduler))
    }

    /// Merges this observable with `sources`. See [`Observable::merge`].
    fn merge_with(self, sources: impl IntoIterator<Item = Observable<T>>) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
    {
        let this = Observable::new(move |o| self.subscribe(o));
        Observable::merge(std::iter::once(this).chain(sources))
    }

    /// Collects every item and emits them as one `Vec` when the source
    /// completes. On error the collected items are dropped.
    fn to_list(self) -> Observable<Vec<T>>
    where
        Self: Sized + Send + Sync + 'static,
    {
        Observable::new(move |o| {
            let (o_shared, teardown) = share(o);
            let o_cloned_e = Arc::clone(&o_shared);
            let buffer = Arc::new(Mutex::new(Vec::new()));
            let buffer_e = Arc::clone(&buffer);
            let buffer_c = Arc::clone(&buffer);

            let mut u = Subscriber::new(
                move |v| buffer.lock().push(v),
                move |observable_error| {
                    buffer_e.lock().clear();
                    o_cloned_e.lock().error(observable_error);
                },
                move || {
                    let list = std::mem::take(&mut *buffer_c.lock());
                    let mut o = o_shared.lock();
                    o.next(list);
                    o.complete();
                },
            );
            u.set_teardown(teardown);
            self.subscribe(u)
        })
    }

    /// Fails with [`ObservableError::Timeout`](crate::errors::ObservableError::Timeout)
    /// if no item arrives within `duration` of the subscription or of the
    /// previous item. Upstream is cancelled when the timer fires.
    fn timeout(self, duration: Duration, scheduler: SchedulerRef) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
    {
        timeout::timeout(self, duration, scheduler, TimeoutMode::default())
    }

    /// [`timeout`](Self::timeout) with an explicit [`TimeoutMode`].
    fn timeout_with(
        self,
        duration: Duration,
        scheduler: SchedulerRef,
        mode: TimeoutMode,
    ) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
    {
        timeout::timeout(self, duration, scheduler, mode)
    }

    /// Shifts every item and the completion forward in time by `duration`,
    /// keeping their order. The wait happens on `scheduler`, never on the
    /// producing thread. Errors are delivered at once and drop pending items.
    fn delay(self, duration: Duration, scheduler: SchedulerRef) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
    {
        delay::delay(self, duration, scheduler)
    }

    /// Replaces an error with the value returned by `f`, followed by
    /// `complete`. If `f` fails, its error becomes the stream's error.
    fn on_error_return<E, F>(self, f: F) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
        F: Fn(StreamError) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let f = Arc::new(f);
        Observable::new(move |o| {
            let f = Arc::clone(&f);
            let (o_shared, teardown) = share(o);
            let o_cloned_e = Arc::clone(&o_shared);
            let o_cloned_c = Arc::clone(&o_shared);

            let mut u = Subscriber::new(
                move |v| o_shared.lock().next(v),
                move |observable_error| {
                    let mut o = o_cloned_e.lock();
                    match f(observable_error) {
                        Ok(v) => {
                            o.next(v);
                            o.complete();
                        }
                        Err(e) => o.error(into_stream_error(e)),
                    }
                },
                move || o_cloned_c.lock().complete(),
            );
            u.set_teardown(teardown);
            self.subscribe(u)
        })
    }

    /// On error, continues with the observable returned by `f`.
    fn on_error_resume_next<F>(self, f: F) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
        F: Fn(StreamError) -> Observable<T> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Observable::new(move |o| {
            let f = Arc::clone(&f);
            let (o_shared, teardown) = share(o);
            let o_cloned_e = Arc::clone(&o_shared);
            let o_cloned_c = Arc::clone(&o_shared);

            // The source gets its own teardown: it closes when the source fails,
            // while the fallback keeps running under `teardown`.
            let u = Subscriber::new(
                move |v| o_shared.lock().next(v),
                move |observable_error| {
                    let fallback = f(observable_error);
                    let inner = wrap_subscriber(&o_cloned_e);
                    teardown.add(inner.teardown().subscription());
                    fallback.subscribe(inner);
                },
                move || o_cloned_c.lock().complete(),
            );
            self.subscribe(u)
        })
    }

    /// Subscribes with a subscriber that ignores items.
    ///
    /// There is no error handler, so an error escalates through the
    /// unhandled-error path on the thread that delivers it (see
    /// [`set_unhandled_error_hook`](crate::errors::set_unhandled_error_hook)).
    fn run(self) -> Subscription
    where
        Self: Sized,
    {
        self.subscribe(Subscriber::on_next(|_| {}))
    }

    /// Returns a handle whose methods subscribe and block the calling thread
    /// until the result is known. Calling `to_blocking` alone starts nothing.
    fn to_blocking(self) -> BlockingObservable<T>
    where
        Self: Sized + Send + Sync + 'static,
    {
        BlockingObservable::new(Observable::new(move |o| self.subscribe(o)))
    }
}

impl<O, T: Send + 'static> ObservableExt<T> for O where O: Subscribeable<ObsType = T> {}
