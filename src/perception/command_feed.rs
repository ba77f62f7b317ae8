use async_trait::async_trait;
use tokio::process::Command;

use crate::config::PerceptionConfig;
use crate::errors::{TrigWatchError, TrigWatchResult};
use crate::perception::traits::PerceptionProvider;
use crate::perception::types::{Observation, TextFragment};

/// Runs an external OCR helper once per capture. The helper must print a JSON
/// array of `{"text": .., "x": .., "y": ..}` objects on stdout.
pub struct CommandFeed {
    command: String,
    args: Vec<String>,
}

impl CommandFeed {
    pub fn new(command: String, args: Vec<String>) -> Self {
        Self { command, args }
    }

    pub fn from_config(cfg: &PerceptionConfig) -> TrigWatchResult<Self> {
        if cfg.command.trim().is_empty() {
            return Err(TrigWatchError::Config(
                "[perception] command is not set; an OCR helper is required".into(),
            ));
        }
        Ok(Self::new(cfg.command.clone(), cfg.args.clone()))
    }
}

#[async_trait]
impl PerceptionProvider for CommandFeed {
    async fn capture(&self) -> TrigWatchResult<Observation> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TrigWatchError::Perception(format!("failed to run '{}': {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TrigWatchError::Perception(format!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let observation = parse_fragments(&stdout)?;
        tracing::trace!(fragments = observation.fragments.len(), "perception pass complete");
        Ok(observation)
    }
}

/// An empty helper output is a valid, empty observation.
pub fn parse_fragments(stdout: &str) -> TrigWatchResult<Observation> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Observation::default());
    }
    let fragments: Vec<TextFragment> = serde_json::from_str(trimmed)
        .map_err(|e| TrigWatchError::Perception(format!("helper output is not a fragment list: {e}")))?;
    Ok(Observation::from_fragments(fragments))
}
