use crate::subscription::subscribe::Subscription;

use super::{Scheduler, Work};

/// Runs work synchronously on the thread that schedules it.
///
/// By the time `schedule` returns the work already ran, so the returned
/// subscription has nothing left to cancel. Panics raised by the work propagate
/// to the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn name(&self) -> &str {
        "immediate"
    }

    fn schedule(&self, work: Work) -> Subscription {
        work();
        Subscription::nil()
    }
}
