use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::WatchdogConfig;
use crate::executor::SharedExecutor;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Last time the watch loop saw something happen, shared with the watchdog.
#[derive(Debug, Clone)]
pub struct ActivityClock(Arc<AtomicI64>);

impl ActivityClock {
    pub fn new() -> Self {
        Self(Arc::new(AtomicI64::new(now_millis())))
    }

    pub fn touch(&self) {
        self.0.store(now_millis(), Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let idle = now_millis() - self.0.load(Ordering::Relaxed);
        Duration::from_millis(idle.max(0) as u64)
    }

    #[cfg(test)]
    pub fn rewind(&self, by: Duration) {
        self.0.fetch_sub(by.as_millis() as i64, Ordering::Relaxed);
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Runs a fixed list of library entries once the loop has been idle too long,
/// then waits for activity before it can fire again.
pub struct IdleWatchdog {
    executor: SharedExecutor,
    activity: ActivityClock,
    config: WatchdogConfig,
    stop: Arc<AtomicBool>,
    fired: bool,
}

impl IdleWatchdog {
    pub fn new(
        executor: SharedExecutor,
        activity: ActivityClock,
        config: WatchdogConfig,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            executor,
            activity,
            config,
            stop,
            fired: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.idle_timeout_secs > 0 && !self.config.entry_ids.is_empty()
    }

    /// Starts the watchdog task, or returns `None` when it is disabled.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            tracing::debug!("idle watchdog disabled");
            return None;
        }
        Some(tokio::spawn(self.run()))
    }

    async fn run(mut self) {
        tracing::info!(
            timeout_secs = self.config.idle_timeout_secs,
            entries = ?self.config.entry_ids,
            "idle watchdog started"
        );
        while !self.stop.load(Ordering::Relaxed) {
            tokio::time::sleep(POLL_INTERVAL).await;
            self.check().await;
        }
        tracing::info!("idle watchdog stopped");
    }

    /// One poll. Returns whether the entries were run.
    pub async fn check(&mut self) -> bool {
        let idle = self.activity.idle_for();
        if idle < Duration::from_secs(self.config.idle_timeout_secs) {
            self.fired = false;
            return false;
        }
        if self.fired {
            return false;
        }
        self.fired = true;

        tracing::warn!(idle_secs = idle.as_secs(), "loop idle, running watchdog entries");
        let executor = self.executor.lock().await;
        let delay = Duration::from_millis(self.config.step_delay_ms);
        for (idx, id) in self.config.entry_ids.iter().enumerate() {
            if idx > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let report = executor.execute_entry(*id).await;
            if !report.success {
                tracing::warn!(id, error = report.error.as_deref().unwrap_or(""), "watchdog entry failed");
            }
        }
        true
    }
}
