use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, trace};

use crate::config::PoolConfig;
use crate::errors::SchedulerError;
use crate::subscription::subscribe::Subscription;

use super::{run_guarded, CancelToken, Scheduler, Work};

struct Job {
    work: Work,
    token: CancelToken,
}

#[derive(Default)]
struct PoolState {
    /// Workers waiting for work that no submitter has claimed yet.
    idle: AtomicUsize,
    live: AtomicUsize,
    spawned: AtomicUsize,
}

impl PoolState {
    /// Takes one idle worker out of the idle count. Fails when none is left.
    fn take_idle(&self) -> bool {
        let mut idle = self.idle.load(Ordering::Acquire);
        while idle > 0 {
            match self.idle.compare_exchange_weak(
                idle,
                idle - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(current) => idle = current,
            }
        }
        false
    }
}

/// Elastic pool of named worker threads.
///
/// Work goes through an unbounded queue. Submitting work claims an idle worker
/// if there is one and spawns a new thread otherwise, so the pool grows with
/// the number of concurrently blocked tasks. A worker that stays idle for the
/// configured keep-alive exits. Dropping the scheduler disconnects the queue;
/// workers drain what is left and exit.
pub struct PooledScheduler {
    config: PoolConfig,
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    state: Arc<PoolState>,
}

impl PooledScheduler {
    /// Creates a pool from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: PoolConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(Self::from_valid_config(config))
    }

    /// Creates a pool with [`PoolConfig::default`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::from_valid_config(PoolConfig::default())
    }

    fn from_valid_config(config: PoolConfig) -> Self {
        let (sender, receiver) = unbounded();
        info!(
            prefix = %config.thread_name_prefix,
            keep_alive_ms = config.keep_alive_ms,
            "pooled scheduler created"
        );
        PooledScheduler {
            config,
            sender,
            receiver,
            state: Arc::new(PoolState::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of worker threads currently alive.
    #[must_use]
    pub fn live_threads(&self) -> usize {
        self.state.live.load(Ordering::Acquire)
    }

    /// Number of workers waiting for work.
    #[must_use]
    pub fn idle_threads(&self) -> usize {
        self.state.idle.load(Ordering::Acquire)
    }

    fn spawn_worker(&self) {
        let n = self.state.spawned.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("{}-{n}", self.config.thread_name_prefix);
        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let receiver = self.receiver.clone();
        let state = Arc::clone(&self.state);
        let keep_alive = self.config.keep_alive();
        let scheduler = self.config.thread_name_prefix.clone();

        self.state.live.fetch_add(1, Ordering::AcqRel);
        match builder.spawn(move || worker_loop(&receiver, &state, keep_alive, &scheduler)) {
            Ok(_) => debug!(thread = %name, "pool worker started"),
            Err(e) => {
                self.state.live.fetch_sub(1, Ordering::AcqRel);
                error!(thread = %name, error = %e, "failed to spawn pool worker");
            }
        }
    }
}

impl Scheduler for PooledScheduler {
    fn name(&self) -> &str {
        &self.config.thread_name_prefix
    }

    fn schedule(&self, work: Work) -> Subscription {
        let token = CancelToken::new();
        let claimed = self.state.take_idle();
        let job = Job {
            work,
            token: token.clone(),
        };
        if self.sender.send(job).is_err() {
            // The pool owns a receiver, so the queue cannot be disconnected
            // while `self` is alive.
            error!(scheduler = %self.config.thread_name_prefix, "pool queue disconnected");
        }
        if !claimed {
            self.spawn_worker();
        }
        token.into()
    }
}

fn worker_loop(receiver: &Receiver<Job>, state: &PoolState, keep_alive: Duration, scheduler: &str) {
    // A fresh worker is owed the job that caused it to be spawned, so it does
    // not count itself idle until it ran something or timed out.
    let mut counted_idle = false;
    loop {
        match receiver.recv_timeout(keep_alive) {
            Ok(job) => {
                run_guarded(job.work, &job.token, scheduler);
                state.idle.fetch_add(1, Ordering::AcqRel);
                counted_idle = true;
            }
            Err(RecvTimeoutError::Timeout) => {
                if !counted_idle {
                    state.idle.fetch_add(1, Ordering::AcqRel);
                    counted_idle = true;
                    continue;
                }
                // Retire only if no submitter claimed this worker meanwhile.
                if state.take_idle() {
                    trace!(scheduler, "pool worker idle past keep-alive");
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                if counted_idle {
                    state.take_idle();
                }
                break;
            }
        }
    }
    state.live.fetch_sub(1, Ordering::AcqRel);
    debug!(
        scheduler,
        thread = thread::current().name().unwrap_or("<unnamed>"),
        "pool worker exiting"
    );
}
