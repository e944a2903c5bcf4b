use std::time::Duration;

use tokio::runtime::Handle;
use tracing::warn;

use crate::subscription::subscribe::{Subscription, UnsubscribeLogic};

use super::{run_guarded, CancelToken, Scheduler, Work};

/// Runs work on a `tokio` runtime.
///
/// Work is treated as blocking and goes to the runtime's blocking pool through
/// `spawn_blocking`. Delays are awaited with `tokio::time::sleep`, so the
/// runtime needs its time driver enabled.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        TokioScheduler { handle }
    }

    /// Uses the runtime the caller currently runs in, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn name(&self) -> &str {
        "tokio"
    }

    fn schedule(&self, work: Work) -> Subscription {
        let token = CancelToken::new();
        let task_token = token.clone();
        let task = self
            .handle
            .spawn_blocking(move || run_guarded(work, &task_token, "tokio"));
        Subscription::new(UnsubscribeLogic::Logic(Box::new(move || {
            token.cancel();
            task.abort();
        })))
    }

    fn schedule_after(&self, delay: Duration, work: Work) -> Subscription {
        let token = CancelToken::new();
        let task_token = token.clone();
        let handle = self.handle.clone();
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if task_token.is_cancelled() {
                return;
            }
            let blocking = handle.spawn_blocking(move || run_guarded(work, &task_token, "tokio"));
            if let Err(e) = blocking.await {
                warn!(error = %e, "delayed tokio work did not finish");
            }
        });
        Subscription::new(UnsubscribeLogic::Logic(Box::new(move || {
            token.cancel();
            task.abort();
        })))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn runs_delayed_work_on_runtime() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let start = Instant::now();

        let _task = scheduler.schedule_after(
            Duration::from_millis(30),
            Box::new(move || {
                let _ = tx.send(Instant::now());
            }),
        );

        let ran_at = rx.await.unwrap();
        assert!(ran_at.duration_since(start) >= Duration::from_millis(30));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancelled_work_never_runs() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let task = scheduler.schedule_after(
            Duration::from_millis(30),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        crate::subscription::subscribe::Unsubscribeable::unsubscribe(task);

        // The sender is dropped together with the aborted task.
        assert!(rx.await.is_err());
    }
}
