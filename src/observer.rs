//! The consumer side of the notification protocol.

use crate::errors::StreamError;

/// Capability set a stream pushes notifications into.
///
/// A well-behaved producer calls `next` zero or more times followed by exactly
/// one of `complete` or `error`.
pub trait Observer {
    /// Type of the values received through `next`.
    type NextFnType;

    /// Receives the next value.
    fn next(&mut self, _: Self::NextFnType);
    /// Receives successful termination.
    fn complete(&mut self);
    /// Receives failed termination.
    fn error(&mut self, _: StreamError);
}

/// A notification captured as a value so it can be queued and delivered later,
/// possibly from another thread.
pub enum Notification<T> {
    /// A `next` call carrying a value.
    Next(T),
    /// An `error` call.
    Error(StreamError),
    /// A `complete` call.
    Complete,
}

impl<T> Notification<T> {
    /// Replays this notification into `observer`.
    pub fn deliver<O: Observer<NextFnType = T> + ?Sized>(self, observer: &mut O) {
        match self {
            Notification::Next(v) => observer.next(v),
            Notification::Error(e) => observer.error(e),
            Notification::Complete => observer.complete(),
        }
    }

    /// Returns `true` for `Error` and `Complete`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }
}
