//! Error types flowing through observables and the policy applied to errors
//! nobody handles.

mod observable_errors;
mod unhandled;

pub use observable_errors::*;
pub use unhandled::{reset_unhandled_error_hook, set_unhandled_error_hook};

pub(crate) use unhandled::raise_unhandled;
