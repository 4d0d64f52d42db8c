//! Inbound-activity liveness monitoring.
//!
//! The monitor checks every `timeout / 2` whether anything arrived within
//! `timeout`. When nothing did it calls `on_stale` once, then stays quiet
//! until [`HeartbeatMonitor::reset`] records new activity.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

struct Activity {
    last: Mutex<Instant>,
    fired: AtomicBool,
}

impl Activity {
    fn mark(&self) {
        *self.last.lock() = Instant::now();
        self.fired.store(false, Ordering::Release);
    }

    fn idle_for(&self) -> Duration {
        self.last.lock().elapsed()
    }
}

/// Declares a connection stale after a period of silence.
pub struct HeartbeatMonitor {
    timeout: Duration,
    check_interval: Duration,
    activity: Arc<Activity>,
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl HeartbeatMonitor {
    /// Monitor with the given silence timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            check_interval: (timeout / 2).max(MIN_CHECK_INTERVAL),
            activity: Arc::new(Activity {
                last: Mutex::new(Instant::now()),
                fired: AtomicBool::new(false),
            }),
            running: None,
        }
    }

    /// Silence allowed before the connection is stale.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Period of the staleness check.
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Start checking. Counts as activity; replaces any running check.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<F>(&mut self, on_stale: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.stop();
        self.activity.mark();

        let cancel = CancellationToken::new();
        let activity = Arc::clone(&self.activity);
        let timeout = self.timeout;
        let period = self.check_interval;
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if activity.idle_for() >= timeout
                            && !activity.fired.swap(true, Ordering::AcqRel)
                        {
                            tracing::debug!(timeout_ms = timeout.as_millis(), "no inbound activity, connection stale");
                            on_stale();
                        }
                    }
                    () = token.cancelled() => return,
                }
            }
        });
        self.running = Some((cancel, handle));
    }

    /// Record inbound activity and re-arm the stale callback.
    pub fn reset(&self) {
        self.activity.mark();
    }

    /// Stop checking. Safe to call when not running.
    pub fn stop(&mut self) {
        if let Some((cancel, handle)) = self.running.take() {
            cancel.cancel();
            handle.abort();
        }
    }

    /// Whether a check loop is active.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        self.activity.idle_for()
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for HeartbeatMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatMonitor")
            .field("timeout", &self.timeout)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
