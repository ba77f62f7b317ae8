use async_trait::async_trait;

use crate::errors::TrigWatchResult;
use crate::perception::types::Observation;

/// Turns the watched screen region into positioned text.
/// Implementations live outside the decision loop (OCR engines, test feeds).
#[async_trait]
pub trait PerceptionProvider: Send + Sync {
    async fn capture(&self) -> TrigWatchResult<Observation>;
}

/// Platform window enumeration and focus.
pub trait WindowService: Send + Sync {
    /// Brings the first visible window whose title contains `title` to the
    /// foreground. Returns whether one was found.
    fn focus_by_title(&self, title: &str) -> TrigWatchResult<bool>;
}

/// Used when no platform window service is wired in.
pub struct NullWindowService;

impl WindowService for NullWindowService {
    fn focus_by_title(&self, title: &str) -> TrigWatchResult<bool> {
        tracing::warn!(title = %title, "no window service available; focus request ignored");
        Ok(false)
    }
}
