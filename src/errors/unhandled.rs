use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::error;

use super::{StreamError, UnhandledError};

type Hook = Arc<dyn Fn(StreamError) + Send + Sync>;

static UNHANDLED_HOOK: Lazy<RwLock<Option<Hook>>> = Lazy::new(|| RwLock::new(None));

/// Installs a process-wide handler for errors that reach a `Subscriber` without
/// an error closure.
///
/// The hook runs on the thread that detected the error. It replaces any
/// previously installed hook.
pub fn set_unhandled_error_hook(hook: impl Fn(StreamError) + Send + Sync + 'static) {
    *UNHANDLED_HOOK.write() = Some(Arc::new(hook));
}

/// Removes the hook installed with [`set_unhandled_error_hook`], restoring the
/// default escalation (log, then panic with [`UnhandledError`]).
pub fn reset_unhandled_error_hook() {
    *UNHANDLED_HOOK.write() = None;
}

/// Escalates an error nobody registered a handler for.
pub(crate) fn raise_unhandled(err: StreamError) {
    // Clone the hook out so it is not called under the lock.
    let hook = UNHANDLED_HOOK.read().clone();
    match hook {
        Some(hook) => hook(err),
        None => {
            error!(error = %err, "observable error not handled by subscriber");
            std::panic::panic_any(UnhandledError::new(err));
        }
    }
}
