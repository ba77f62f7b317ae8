use std::sync::Arc;
use std::time::Duration;

use crate::config::AnchorConfig;
use crate::errors::TrigWatchResult;
use crate::executor::input::{ClickKind, DesktopDriver};
use crate::perception::traits::WindowService;

/// Goals that move focus on purpose; restoring afterwards would undo them.
const SKIP_WORDS: &[&str] = &["focus", "goto", "switch tab", "previous tab"];

/// Where focus returns after a dispatched action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorTarget {
    /// Next browser tab (ctrl+tab).
    Tab,
    /// First window whose title contains the text.
    Window(String),
    /// Browser tab search (ctrl+shift+a) for the text.
    Search(String),
}

impl AnchorTarget {
    /// `""` disables restoring; a bare word is treated as a tab search.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }
        if spec.eq_ignore_ascii_case("tab") {
            return Some(AnchorTarget::Tab);
        }
        if let Some(title) = spec.strip_prefix("window:") {
            return Some(AnchorTarget::Window(title.trim().to_string()));
        }
        let text = spec.strip_prefix("search:").unwrap_or(spec);
        Some(AnchorTarget::Search(text.trim().to_string()))
    }
}

pub struct AnchorRestorer {
    target: Option<AnchorTarget>,
    config: AnchorConfig,
    windows: Arc<dyn WindowService>,
}

impl AnchorRestorer {
    pub fn new(config: AnchorConfig, windows: Arc<dyn WindowService>) -> Self {
        Self {
            target: AnchorTarget::parse(&config.target),
            config,
            windows,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    pub fn should_skip(goal: &str) -> bool {
        let goal = goal.to_lowercase();
        SKIP_WORDS.iter().any(|w| goal.contains(w))
    }

    /// Returns whether focus was restored.
    pub async fn restore(&self, driver: &dyn DesktopDriver, goal: &str) -> TrigWatchResult<bool> {
        let Some(target) = &self.target else {
            return Ok(false);
        };
        if Self::should_skip(goal) {
            tracing::debug!(goal = %goal, "goal moves focus itself; anchor left alone");
            return Ok(false);
        }

        let settle = Duration::from_millis(self.config.settle_ms);
        tracing::info!(target = ?target, "restoring focus");
        tokio::time::sleep(settle).await;

        match target {
            AnchorTarget::Tab => driver.press_combo(&keys(&["ctrl", "tab"]))?,
            AnchorTarget::Window(title) => {
                if !self.windows.focus_by_title(title)? {
                    tracing::warn!(title = %title, "anchor window not found");
                }
            }
            AnchorTarget::Search(text) => {
                driver.press_combo(&keys(&["ctrl", "shift", "a"]))?;
                tokio::time::sleep(settle).await;
                driver.type_text(text)?;
                tokio::time::sleep(settle).await;
                driver.press_combo(&keys(&["enter"]))?;
            }
        }
        tokio::time::sleep(settle).await;

        let (width, height) = driver.screen_size()?;
        driver.click(width / 2, height - self.config.input_offset_px, ClickKind::Left)?;
        Ok(true)
    }
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|k| k.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::dispatcher::tests::RecordingDriver;
    use crate::perception::traits::NullWindowService;

    fn restorer(target: &str) -> AnchorRestorer {
        let config = AnchorConfig {
            target: target.into(),
            settle_ms: 0,
            input_offset_px: 100,
        };
        AnchorRestorer::new(config, Arc::new(NullWindowService))
    }

    #[test]
    fn parses_target_forms() {
        assert_eq!(AnchorTarget::parse(""), None);
        assert_eq!(AnchorTarget::parse("TAB"), Some(AnchorTarget::Tab));
        assert_eq!(AnchorTarget::parse("window:ChatGPT"), Some(AnchorTarget::Window("ChatGPT".into())));
        assert_eq!(AnchorTarget::parse("search:gemini"), Some(AnchorTarget::Search("gemini".into())));
        assert_eq!(AnchorTarget::parse("claude"), Some(AnchorTarget::Search("claude".into())));
    }

    #[tokio::test]
    async fn tab_mode_switches_then_clicks_input() {
        let driver = RecordingDriver::default();
        assert!(restorer("tab").restore(&driver, "open app | calc").await.unwrap());
        assert_eq!(driver.calls(), vec!["keys ctrl+tab", "click 960 980"]);
    }

    #[tokio::test]
    async fn search_mode_types_the_query() {
        let driver = RecordingDriver::default();
        restorer("search:gemini").restore(&driver, "minimize").await.unwrap();
        assert_eq!(
            driver.calls(),
            vec!["keys ctrl+shift+a", "type gemini", "keys enter", "click 960 980"]
        );
    }

    #[tokio::test]
    async fn focus_goals_and_disabled_anchor_do_nothing() {
        let driver = RecordingDriver::default();
        assert!(!restorer("tab").restore(&driver, "focus window | Notes").await.unwrap());
        assert!(!restorer("").restore(&driver, "minimize").await.unwrap());
        assert!(driver.calls().is_empty());
    }
}
