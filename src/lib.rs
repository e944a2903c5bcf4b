//! Cold, push-based reactive streams.
//!
//! An [`Observable`] describes a producer that pushes values into a
//! [`Subscriber`]. Nothing runs until it is subscribed, and each subscription
//! runs the producer anew. Operators from [`ObservableExt`] wrap observables
//! into new ones; [`scheduler`] decides which threads do the work, and
//! [`BlockingObservable`] hands a result back to synchronous code.
//!
//! ```no_run
//! use rxlite::{scheduler, Observable, ObservableExt};
//!
//! let doubled = Observable::from_fn(|| 21)
//!     .subscribe_on(scheduler::io())
//!     .map(|v| v * 2)
//!     .to_blocking()
//!     .single()
//!     .unwrap();
//!
//! assert_eq!(doubled, 42);
//! ```

mod blocking;
pub mod config;
pub mod errors;
mod observable;
mod observer;
pub mod scheduler;
pub mod subscription;
pub mod telemetry;

pub use blocking::BlockingObservable;
pub use config::PoolConfig;
pub use errors::{
    into_stream_error, BoxError, ObservableError, SchedulerError, StreamError, UnhandledError,
};
pub use observable::{Observable, ObservableExt, TimeoutMode};
pub use observer::{Notification, Observer};
pub use scheduler::{CancelToken, Scheduler, SchedulerRef};
pub use subscription::shared::SharedSubscription;
pub use subscription::subscribe::{
    Subscribeable, Subscriber, Subscription, UnsubscribeLogic, Unsubscribeable,
};
