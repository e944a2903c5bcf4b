use std::{error::Error, sync::Arc, time::Duration};

use thiserror::Error;

/// Error type carried by the `error` channel of every observable.
///
/// It is reference counted so that operators can hand the same error to several
/// places (for example, a blocking caller and a log line) without cloning the
/// underlying value. The concrete error stays reachable through
/// `downcast_ref`.
pub type StreamError = Arc<dyn Error + Send + Sync + 'static>;

/// Boxed error accepted from user closures before it enters a stream.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Converts anything that can become a boxed error into a [`StreamError`].
///
/// The conversion goes through `Box<dyn Error>`, so a concrete error type `E`
/// ends up directly behind the `Arc` and `err.downcast_ref::<E>()` keeps working.
pub fn into_stream_error<E: Into<BoxError>>(e: E) -> StreamError {
    Arc::from(e.into())
}

/// Errors produced by the engine itself rather than by user code.
#[derive(Debug, Error)]
pub enum ObservableError {
    /// No notification arrived within the configured duration.
    #[error("no notification arrived within {0:?}")]
    Timeout(Duration),
    /// A single-value extraction observed no values.
    #[error("sequence contains no elements")]
    NoElements,
    /// A single-value extraction observed more than one value.
    #[error("sequence contains more than one element")]
    TooManyElements,
    /// The producer went away without a terminal notification, typically
    /// because it panicked on a scheduler thread.
    #[error("stream was abandoned before it terminated")]
    Abandoned,
    /// The executor waiting on a future was cancelled before it resolved.
    #[error("future was cancelled before it resolved")]
    FutureCancelled,
}

impl ObservableError {
    /// Returns `true` for the errors raised when a blocking extraction sees the
    /// wrong number of values.
    #[must_use]
    pub fn is_cardinality(&self) -> bool {
        matches!(self, Self::NoElements | Self::TooManyElements)
    }

    /// Wraps the error into a [`StreamError`].
    #[must_use]
    pub fn into_stream(self) -> StreamError {
        Arc::new(self)
    }
}

/// Errors returned while building a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The pool configuration failed validation.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),
}

/// Payload of the panic raised when an error reaches a `Subscriber` that has no
/// error handler and no unhandled-error hook is installed.
#[derive(Debug, Error)]
#[error("error not handled by subscriber: {error}")]
pub struct UnhandledError {
    error: StreamError,
}

impl UnhandledError {
    pub(crate) fn new(error: StreamError) -> Self {
        UnhandledError { error }
    }

    /// The error that was not handled.
    #[must_use]
    pub fn error(&self) -> &StreamError {
        &self.error
    }

    /// Consumes the wrapper and returns the original error.
    #[must_use]
    pub fn into_inner(self) -> StreamError {
        self.error
    }
}
