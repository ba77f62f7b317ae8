use std::time::Duration;

use crate::perception::traits::PerceptionProvider;

#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Polls perception until `target` appears (case-insensitive) in the part of
/// each capture that `visible` keeps, or the timeout passes. Capture errors
/// count as "not seen yet".
pub async fn wait_for_text<F>(
    perception: &dyn PerceptionProvider,
    target: &str,
    config: &WaitConfig,
    visible: F,
) -> bool
where
    F: Fn(&str) -> String,
{
    let needle = target.to_lowercase();
    let start_time = std::time::Instant::now();
    tracing::info!(target = %target, timeout = ?config.timeout, "waiting for text");

    while start_time.elapsed() < config.timeout {
        match perception.capture().await {
            Ok(obs) if visible(&obs.full_text).to_lowercase().contains(&needle) => {
                tracing::info!(target = %target, elapsed = ?start_time.elapsed(), "text detected");
                return true;
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "capture failed while waiting"),
        }
        tokio::time::sleep(config.poll_interval).await;
    }

    tracing::warn!(target = %target, "timeout waiting for text");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TrigWatchResult;
    use crate::perception::types::{Observation, TextFragment};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AppearsAfter {
        calls: AtomicUsize,
        after: usize,
    }

    #[async_trait]
    impl PerceptionProvider for AppearsAfter {
        async fn capture(&self) -> TrigWatchResult<Observation> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let text = if n >= self.after { "Upload Complete" } else { "uploading" };
            Ok(Observation::from_fragments(vec![TextFragment::new(text, 0, 0)]))
        }
    }

    fn fast(timeout_ms: u64) -> WaitConfig {
        WaitConfig {
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn returns_once_text_shows_up() {
        let feed = AppearsAfter { calls: AtomicUsize::new(0), after: 2 };
        assert!(wait_for_text(&feed, "upload complete", &fast(1000), |t| t.to_string()).await);
        assert_eq!(feed.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn only_the_visible_part_counts() {
        let feed = AppearsAfter { calls: AtomicUsize::new(0), after: 0 };
        let hide_upload = |t: &str| t.replace("Upload", "");
        assert!(!wait_for_text(&feed, "upload complete", &fast(30), hide_upload).await);
        assert!(feed.calls.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn gives_up_after_timeout() {
        let feed = AppearsAfter { calls: AtomicUsize::new(0), after: usize::MAX };
        assert!(!wait_for_text(&feed, "done", &fast(30), |t| t.to_string()).await);
    }
}
