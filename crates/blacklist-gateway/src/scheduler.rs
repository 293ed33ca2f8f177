//! Background refresh loop with a runtime-adjustable interval.
//!
//! ```text
//!   ┌─────────┐  cycle done   ┌─────────┐  shutdown   ┌─────────┐
//!   │ Running │ ────────────→ │ Waiting │ ──────────→ │ Stopped │
//!   └─────────┘ ←──────────── └─────────┘             └─────────┘
//!                 elapsed        │    ↑
//!                                └────┘ interval changed: re-arm
//! ```
//!
//! A wait is measured from the moment it began. When the interval changes
//! mid-wait the deadline is recomputed from that same start with the new
//! value; no cycle is forced by the change itself.

use crate::cache::{BlacklistCache, RefreshOutcome};
use crate::domain::error::{ApiError, ApiResult};
use crate::ports::outbound::LedgerGateway;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest accepted refresh interval: one year, in seconds.
pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

/// Shared handle to the refresh interval (seconds, within `1..=MAX_INTERVAL_SECS`).
///
/// `set` is the only writer. Every change wakes the scheduler if it is
/// currently waiting.
#[derive(Debug, Clone)]
pub struct IntervalControl {
    tx: Arc<watch::Sender<u64>>,
}

impl IntervalControl {
    /// Values outside `1..=MAX_INTERVAL_SECS` are clamped into range.
    pub fn new(initial_secs: u64) -> Self {
        let (tx, _rx) = watch::channel(initial_secs.clamp(1, MAX_INTERVAL_SECS));
        Self { tx: Arc::new(tx) }
    }

    /// Current interval in seconds
    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Replace the interval. Out-of-range values are rejected and leave the
    /// current value unchanged.
    pub fn set(&self, secs: i64) -> ApiResult<u64> {
        if secs < 1 {
            return Err(ApiError::invalid_field("interval", "must be >= 1"));
        }
        let secs = secs as u64;
        if secs > MAX_INTERVAL_SECS {
            return Err(ApiError::invalid_field(
                "interval",
                format!("must be <= {}", MAX_INTERVAL_SECS),
            ));
        }
        let previous = self.tx.send_replace(secs);
        info!(
            previous_secs = previous,
            interval_secs = secs,
            "Auto update interval changed"
        );
        Ok(secs)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    Running = 0,
    Waiting = 1,
    Stopped = 2,
}

impl SchedulerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Running,
            1 => Self::Waiting,
            _ => Self::Stopped,
        }
    }
}

/// Counters exposed for logging and tests
#[derive(Debug)]
pub struct SchedulerStats {
    /// Completed cycles (successful or not)
    pub cycles: AtomicU64,
    /// Cycles in which the ledger or cache refresh failed
    pub failures: AtomicU64,
    state: AtomicU8,
}

impl Default for SchedulerStats {
    fn default() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            state: AtomicU8::new(SchedulerState::Running as u8),
        }
    }
}

impl SchedulerStats {
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn enter(&self, state: SchedulerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

enum WakeReason {
    Elapsed,
    Shutdown,
}

/// Periodic ledger resync feeding the blacklist cache
pub struct RefreshScheduler {
    ledger: Arc<dyn LedgerGateway>,
    cache: Arc<BlacklistCache>,
    interval: watch::Receiver<u64>,
    shutdown: CancellationToken,
    stats: Arc<SchedulerStats>,
}

impl RefreshScheduler {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        cache: Arc<BlacklistCache>,
        interval: &IntervalControl,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            ledger,
            cache,
            interval: interval.subscribe(),
            shutdown,
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        Arc::clone(&self.stats)
    }

    /// Run the loop on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until the shutdown token is cancelled
    pub async fn run(mut self) {
        info!(
            interval_secs = *self.interval.borrow(),
            "Refresh scheduler started"
        );

        while !self.shutdown.is_cancelled() {
            self.stats.enter(SchedulerState::Running);
            self.run_cycle().await;

            self.stats.enter(SchedulerState::Waiting);
            if let WakeReason::Shutdown = self.wait().await {
                break;
            }
        }

        self.stats.enter(SchedulerState::Stopped);
        info!(
            cycles = self.stats.cycles(),
            failures = self.stats.failures(),
            "Refresh scheduler stopped"
        );
    }

    async fn run_cycle(&self) {
        debug!("Running periodic blacklist update");

        let result = match self.ledger.refresh_from_source().await {
            Ok(()) => self.cache.refresh(self.ledger.as_ref()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(RefreshOutcome::Installed(size)) => {
                debug!(blacklisted = size, "Blacklist snapshot updated");
            }
            Ok(RefreshOutcome::Superseded) => {
                debug!("Periodic refresh superseded by a newer read");
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Error updating blacklist, keeping previous snapshot");
            }
        }
        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
    }

    async fn wait(&mut self) -> WakeReason {
        let started = Instant::now();
        let shutdown = &self.shutdown;
        let interval = &mut self.interval;
        // Cleared if the control handle is dropped; the current value then stays fixed
        let mut watch_changes = true;

        loop {
            let secs = (*interval.borrow_and_update()).min(MAX_INTERVAL_SECS);
            let deadline = started
                .checked_add(Duration::from_secs(secs))
                .unwrap_or_else(|| started + Duration::from_secs(MAX_INTERVAL_SECS));
            debug!(interval_secs = secs, "Waiting until next update");

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return WakeReason::Shutdown,
                changed = interval.changed(), if watch_changes => {
                    if changed.is_err() {
                        watch_changes = false;
                    } else {
                        debug!("Refresh interval changed, re-arming wait");
                    }
                }
                _ = tokio::time::sleep_until(deadline) => return WakeReason::Elapsed,
            }
        }
    }
}

/// Wait for a scheduler task to finish, giving up after `bound`.
///
/// Returns true if the task finished in time.
pub async fn join_bounded(handle: JoinHandle<()>, bound: Duration) -> bool {
    match tokio::time::timeout(bound, handle).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "Refresh scheduler task failed");
            true
        }
        Err(_) => {
            warn!(
                bound_ms = bound.as_millis() as u64,
                "Refresh scheduler did not stop in time, continuing shutdown"
            );
            false
        }
    }
}
