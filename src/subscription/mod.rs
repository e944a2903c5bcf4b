//! Provides structures and traits related to subscription management.
//!
//! This module includes types such as `Subscriber` for handling observed values,
//! errors, and completions, as well as `Subscription` and `SharedSubscription`
//! for cancelling running executions of an observable.
pub mod shared;
pub mod subscribe;
