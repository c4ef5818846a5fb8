//! Background eviction of expired nonces and failure records.
//!
//! The sweeper runs on the caller's tokio runtime. Each tick walks both
//! stores shard by shard; a failed or missed tick only delays reclamation.
//! [`SweeperHandle::shutdown`] stops the task and waits for it to finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};
use veil_core::Clock;

use crate::error::{GuardError, GuardResult};
use crate::escalation::FailureEscalator;
use crate::replay::ReplayGuard;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub nonces_evicted: usize,
    pub failures_evicted: usize,
}

/// Notified after every sweep, e.g. to feed counters.
pub trait SweepObserver: Send + Sync {
    fn on_sweep(&self, report: &SweepReport);
}

pub struct Sweeper {
    replay: Arc<ReplayGuard>,
    escalator: Arc<FailureEscalator>,
    clock: Arc<dyn Clock>,
    nonce_ttl_ms: u64,
    interval: Duration,
    observer: Option<Arc<dyn SweepObserver>>,
}

impl Sweeper {
    pub fn new(
        replay: Arc<ReplayGuard>,
        escalator: Arc<FailureEscalator>,
        clock: Arc<dyn Clock>,
        nonce_ttl_ms: u64,
        interval: Duration,
    ) -> GuardResult<Self> {
        if interval.is_zero() {
            return Err(GuardError::ZeroInterval);
        }
        Ok(Self {
            replay,
            escalator,
            clock,
            nonce_ttl_ms,
            interval,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn SweepObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One eviction pass over both stores.
    pub fn sweep_once(&self) -> SweepReport {
        let now = self.clock.now_ms();
        let report = SweepReport {
            nonces_evicted: self.replay.evict_expired(now, self.nonce_ttl_ms),
            failures_evicted: self.escalator.evict_expired(now),
        };
        debug!(
            nonces_evicted = report.nonces_evicted,
            failures_evicted = report.failures_evicted,
            nonce_store_size = self.replay.len(),
            failure_records = self.escalator.len(),
            "sweep complete"
        );
        if let Some(observer) = &self.observer {
            observer.on_sweep(&report);
        }
        report
    }

    /// Spawn the periodic sweep loop. The first sweep runs one interval after
    /// the call.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("sweeper stopped");
        });

        info!(interval_ms = interval.as_millis() as u64, "sweeper started");
        SweeperHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("nonce_ttl_ms", &self.nonce_ttl_ms)
            .field("interval", &self.interval)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

/// Owner of a running sweep task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task and wait until it has exited.
    pub async fn shutdown(self) -> GuardResult<()> {
        // The receiver lives as long as the task; a send error means the task
        // already ended and the join below reports how.
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| GuardError::SweeperFailed(e.to_string()))
    }
}
