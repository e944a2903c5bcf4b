use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;

use super::subscribe::{Subscription, UnsubscribeLogic, Unsubscribeable};

struct SharedInner {
    closed: AtomicBool,
    held: Mutex<Vec<Subscription>>,
}

/// Cloneable, idempotent cancellation token that owns a group of child
/// subscriptions.
///
/// Every `Subscriber` carries one of these as its teardown. Operators register
/// the resources of a subscription on it (upstream subscriptions, scheduled
/// tasks, timers), and unsubscribing it releases all of them at once. A child
/// added after the token was closed is unsubscribed immediately, which covers
/// producers that hand back their subscription only after cancellation was
/// already requested.
#[derive(Clone)]
pub struct SharedSubscription {
    inner: Arc<SharedInner>,
}

impl SharedSubscription {
    /// Creates an open token with no children.
    #[must_use]
    pub fn new() -> Self {
        SharedSubscription {
            inner: Arc::new(SharedInner {
                closed: AtomicBool::new(false),
                held: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns `true` once [`unsubscribe`](Self::unsubscribe) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Registers a child subscription.
    pub fn add(&self, subscription: Subscription) {
        if self.is_same(&subscription) {
            return;
        }
        let mut held = self.inner.held.lock();
        if self.is_closed() {
            drop(held);
            subscription.unsubscribe();
            return;
        }
        held.push(subscription);
    }

    /// Replaces every held child with `subscription`, unsubscribing the
    /// children it replaces. Holds the current pass or timer of a serial
    /// operation.
    pub fn replace(&self, subscription: Subscription) {
        if self.is_same(&subscription) {
            return;
        }
        let mut held = self.inner.held.lock();
        if self.is_closed() {
            drop(held);
            subscription.unsubscribe();
            return;
        }
        let previous = std::mem::replace(&mut *held, vec![subscription]);
        drop(held);
        for subscription in previous {
            subscription.unsubscribe();
        }
    }

    /// Closes the token and unsubscribes every child. Calling it again does
    /// nothing.
    pub fn unsubscribe(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let held = std::mem::take(&mut *self.inner.held.lock());
        for subscription in held {
            subscription.unsubscribe();
        }
    }

    /// Creates a `Subscription` that closes this token when unsubscribed.
    #[must_use]
    pub fn subscription(&self) -> Subscription {
        Subscription::new(UnsubscribeLogic::Shared(self.clone()))
    }

    pub(crate) fn ptr_eq(&self, other: &SharedSubscription) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn is_same(&self, subscription: &Subscription) -> bool {
        matches!(&subscription.unsubscribe_logic, UnsubscribeLogic::Shared(s) if s.ptr_eq(self))
    }
}

impl Default for SharedSubscription {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSubscription")
            .field("closed", &self.is_closed())
            .field("children", &self.inner.held.lock().len())
            .finish()
    }
}

impl From<SharedSubscription> for Subscription {
    fn from(shared: SharedSubscription) -> Self {
        Subscription::new(UnsubscribeLogic::Shared(shared))
    }
}
