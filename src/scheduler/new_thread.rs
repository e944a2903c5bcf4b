use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use tracing::{debug, error};

use crate::subscription::subscribe::Subscription;

use super::{run_guarded, CancelToken, Scheduler, Work};

/// Starts a fresh thread for every unit of work.
#[derive(Debug)]
pub struct NewThreadScheduler {
    prefix: String,
    spawned: AtomicUsize,
}

impl NewThreadScheduler {
    /// Creates a scheduler whose threads are named `rxlite-thread-<n>`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix("rxlite-thread")
    }

    /// Creates a scheduler whose threads are named `<prefix>-<n>`.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        NewThreadScheduler {
            prefix: prefix.into(),
            spawned: AtomicUsize::new(0),
        }
    }
}

impl Default for NewThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for NewThreadScheduler {
    fn name(&self) -> &str {
        &self.prefix
    }

    fn schedule(&self, work: Work) -> Subscription {
        let token = CancelToken::new();
        let task_token = token.clone();
        let n = self.spawned.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("{}-{n}", self.prefix);
        let scheduler = self.prefix.clone();

        match thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_guarded(work, &task_token, &scheduler))
        {
            Ok(_) => debug!(thread = %name, "spawned thread for scheduled work"),
            Err(e) => error!(thread = %name, error = %e, "failed to spawn thread"),
        }
        token.into()
    }
}
