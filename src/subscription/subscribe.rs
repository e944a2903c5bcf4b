use tracing::trace;

use crate::errors::{raise_unhandled, StreamError};
use crate::observer::Observer;

use super::shared::SharedSubscription;

/// A trait for types that can be subscribed to, allowing consumers to receive
/// values emitted by an observable stream.
pub trait Subscribeable {
    /// The type of items emitted by the observable stream.
    type ObsType;

    /// Subscribes to the observable stream and specifies how to handle emitted values.
    ///
    /// The `Subscriber` parameter defines the behavior for processing values emitted
    /// by the observable stream. Every call starts a new, independent execution of
    /// the stream.
    ///
    /// The returned `Subscription` cancels that execution when unsubscribed.
    fn subscribe(&self, s: Subscriber<Self::ObsType>) -> Subscription;
}

/// A trait for types that can be unsubscribed, allowing the clean release of resources
/// associated with a subscription.
///
/// This method can also serve as a signal to notify the observable that it should
/// stop emitting values. This is particularly relevant for asynchronous and/or
/// multithreaded observables. Cancellation is best effort: work that is already
/// running is not interrupted, but nothing it emits afterwards is delivered.
pub trait Unsubscribeable {
    /// Unsubscribes from a subscription and releases associated resources.
    ///
    /// The `Subscription` instance that this method is called on is consumed, making it
    /// unusable after the `unsubscribe` operation.
    fn unsubscribe(self);
}

type NextFn<T> = Box<dyn FnMut(T) + Send>;
type CompleteFn = Box<dyn FnMut() + Send>;
type ErrorFn = Box<dyn FnMut(StreamError) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SubscriberState {
    Active,
    Completed,
    Errored,
}

/// A type that acts as an observer, allowing users to handle emitted values, errors,
/// and completion when subscribing to an `Observable`.
///
/// Users can create a `Subscriber` instance using the `new` method and provide
/// custom functions to handle the `next`, `error`, and `complete` events.
///
/// A `Subscriber` accepts at most one terminal notification. Anything arriving
/// after `complete` or `error`, or after its teardown was unsubscribed, is
/// ignored. A `Subscriber` built without an error function escalates errors
/// through the unhandled-error hook (see
/// [`set_unhandled_error_hook`](crate::errors::set_unhandled_error_hook)).
pub struct Subscriber<NextFnType> {
    next_fn: NextFn<NextFnType>,
    complete_fn: Option<CompleteFn>,
    error_fn: Option<ErrorFn>,
    state: SubscriberState,
    teardown: SharedSubscription,
}

impl<NextFnType> Subscriber<NextFnType> {
    /// Creates a new `Subscriber` instance with custom handling functions for emitted
    /// values, errors, and completion.
    pub fn new(
        next_fn: impl FnMut(NextFnType) + 'static + Send,
        error_fn: impl FnMut(StreamError) + 'static + Send,
        complete_fn: impl FnMut() + 'static + Send,
    ) -> Self {
        Subscriber {
            next_fn: Box::new(next_fn),
            complete_fn: Some(Box::new(complete_fn)),
            error_fn: Some(Box::new(error_fn)),
            state: SubscriberState::Active,
            teardown: SharedSubscription::new(),
        }
    }

    /// Create a new Subscriber with the provided `next` function.
    ///
    /// The `next` closure is called when the observable emits a new item. Errors
    /// are not handled unless an error function is set with
    /// [`on_error`](Self::on_error).
    pub fn on_next(next_fn: impl FnMut(NextFnType) + 'static + Send) -> Self {
        Subscriber {
            next_fn: Box::new(next_fn),
            complete_fn: None,
            error_fn: None,
            state: SubscriberState::Active,
            teardown: SharedSubscription::new(),
        }
    }

    /// Set the completion function for the Subscriber.
    pub fn on_complete(&mut self, complete_fn: impl FnMut() + 'static + Send) {
        self.complete_fn = Some(Box::new(complete_fn));
    }

    /// Set the error-handling function for the Subscriber.
    pub fn on_error(&mut self, error_fn: impl FnMut(StreamError) + 'static + Send) {
        self.error_fn = Some(Box::new(error_fn));
    }

    /// Returns a handle to this subscriber's teardown token.
    ///
    /// Producers register cleanup on it with [`add`](Self::add); unsubscribing it
    /// stops delivery to this subscriber.
    #[must_use]
    pub fn teardown(&self) -> SharedSubscription {
        self.teardown.clone()
    }

    /// Makes this subscriber share `teardown` with another subscriber, so that
    /// cancelling one cancels both.
    pub(crate) fn set_teardown(&mut self, teardown: SharedSubscription) {
        self.teardown = teardown;
    }

    /// Registers a subscription to release when this subscriber is cancelled or
    /// terminates.
    pub fn add(&self, subscription: Subscription) {
        self.teardown.add(subscription);
    }

    /// Returns `true` when nothing more will be delivered to this subscriber,
    /// either because it terminated or because it was cancelled.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state != SubscriberState::Active || self.teardown.is_closed()
    }

    /// Returns `true` once `complete` or `error` was delivered.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state != SubscriberState::Active
    }
}

impl<T> Observer for Subscriber<T> {
    type NextFnType = T;

    fn next(&mut self, v: Self::NextFnType) {
        if self.is_closed() {
            trace!(state = ?self.state, "next ignored by closed subscriber");
            return;
        }
        (self.next_fn)(v);
    }

    fn complete(&mut self) {
        if self.is_closed() {
            trace!(state = ?self.state, "complete ignored by closed subscriber");
            return;
        }
        self.state = SubscriberState::Completed;
        if let Some(cfn) = &mut self.complete_fn {
            (cfn)();
        }
        self.teardown.unsubscribe();
    }

    fn error(&mut self, observable_error: StreamError) {
        if self.is_closed() {
            trace!(
                state = ?self.state,
                error = %observable_error,
                "error ignored by closed subscriber"
            );
            return;
        }
        self.state = SubscriberState::Errored;
        if let Some(efn) = &mut self.error_fn {
            (efn)(observable_error);
            self.teardown.unsubscribe();
        } else {
            self.teardown.unsubscribe();
            raise_unhandled(observable_error);
        }
    }
}

/// Represents a subscription to an observable, allowing control over the
/// subscription.
///
/// When an observable is subscribed to, it returns a `Subscription` instance.
/// Unsubscribing it cancels the execution started by that subscribe call.
pub struct Subscription {
    pub(crate) unsubscribe_logic: UnsubscribeLogic,
}

impl Subscription {
    /// Creates a new Subscription instance with the specified unsubscribe logic.
    ///
    /// See [`UnsubscribeLogic`] for the available unsubscribe strategies.
    #[must_use]
    pub fn new(unsubscribe_logic: UnsubscribeLogic) -> Self {
        Subscription { unsubscribe_logic }
    }

    /// A subscription with nothing to release.
    #[must_use]
    pub fn nil() -> Self {
        Subscription::new(UnsubscribeLogic::Nil)
    }

    /// Returns `true` if this subscription is backed by a token that was already
    /// closed. Subscriptions without a token always report `false`.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match &self.unsubscribe_logic {
            UnsubscribeLogic::Shared(shared) => shared.is_closed(),
            UnsubscribeLogic::Wrapped(subscription) => subscription.is_closed(),
            UnsubscribeLogic::Nil | UnsubscribeLogic::Logic(_) => false,
        }
    }
}

impl Unsubscribeable for Subscription {
    fn unsubscribe(self) {
        self.unsubscribe_logic.unsubscribe();
    }
}

/// Enumerates various unsubscribe logic options for a subscription.
pub enum UnsubscribeLogic {
    /// No specific unsubscribe logic.
    Nil,

    /// If one subscription depends on another. Wrapped subscription's unsubscribe
    /// will be called upon unsubscribing.
    Wrapped(Box<Subscription>),

    /// Unsubscribe logic defined by a function.
    Logic(Box<dyn FnOnce() + Send>),

    /// Unsubscribing closes a shared teardown token and everything it holds.
    Shared(SharedSubscription),
}

impl UnsubscribeLogic {
    fn unsubscribe(self) {
        match self {
            UnsubscribeLogic::Nil => (),
            UnsubscribeLogic::Logic(fnc) => fnc(),
            UnsubscribeLogic::Wrapped(subscription) => subscription.unsubscribe(),
            UnsubscribeLogic::Shared(shared) => shared.unsubscribe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::errors::into_stream_error;

    fn counting_subscriber(
        nexts: &Arc<AtomicUsize>,
        errors: &Arc<AtomicUsize>,
        completes: &Arc<AtomicUsize>,
    ) -> Subscriber<i32> {
        let nexts = Arc::clone(nexts);
        let errors = Arc::clone(errors);
        let completes = Arc::clone(completes);
        Subscriber::new(
            move |_| {
                nexts.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                errors.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                completes.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    #[test]
    fn only_first_terminal_is_delivered() {
        let (n, e, c) = (
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
        );
        let mut s = counting_subscriber(&n, &e, &c);

        s.next(1);
        s.complete();
        s.error(into_stream_error("late"));
        s.complete();
        s.next(2);

        assert_eq!(n.load(Ordering::SeqCst), 1);
        assert_eq!(c.load(Ordering::SeqCst), 1);
        assert_eq!(e.load(Ordering::SeqCst), 0);
        assert!(s.is_terminated());
    }

    #[test]
    fn cancelled_subscriber_drops_notifications() {
        let (n, e, c) = (
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
        );
        let mut s = counting_subscriber(&n, &e, &c);

        s.teardown().unsubscribe();
        s.next(1);
        s.error(into_stream_error("after cancel"));

        assert_eq!(n.load(Ordering::SeqCst), 0);
        assert_eq!(e.load(Ordering::SeqCst), 0);
        assert!(s.is_closed());
        assert!(!s.is_terminated());
    }

    #[test]
    fn terminal_releases_teardown() {
        let released = Arc::new(AtomicUsize::new(0));
        let released_c = Arc::clone(&released);
        let mut s = Subscriber::on_next(|_: i32| {});
        s.add(Subscription::new(UnsubscribeLogic::Logic(Box::new(move || {
            released_c.fetch_add(1, Ordering::SeqCst);
        }))));

        s.complete();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
