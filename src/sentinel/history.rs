use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::TrigWatchResult;
use crate::planner::state::Instruction;

/// One dispatched marker, as written to the history file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub ts: i64,
    pub marker_id: u64,
    pub goal: String,
    pub instruction: Instruction,
    pub success: bool,
}

impl DispatchRecord {
    pub fn now(marker_id: u64, goal: &str, instruction: &Instruction, success: bool) -> Self {
        Self {
            ts: chrono::Utc::now().timestamp_millis(),
            marker_id,
            goal: goal.to_string(),
            instruction: instruction.clone(),
            success,
        }
    }
}

/// Append-only JSONL log of dispatched markers, one file per run.
pub struct DispatchHistory {
    pub session_id: String,
    file_path: PathBuf,
}

impl DispatchHistory {
    pub fn new() -> Self {
        Self::in_dir(&data_dir_or_cwd())
    }

    pub fn in_dir(dir: &Path) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = dir.join(format!("dispatch_{session_id}.jsonl"));
        Self { session_id, file_path }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn append(&self, record: &DispatchRecord) -> TrigWatchResult<()> {
        let line = serde_json::to_string(record)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %self.file_path.display(), marker_id = record.marker_id, "dispatch recorded");
        Ok(())
    }
}

impl Default for DispatchHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// The platform local data directory under `TrigWatch/history`, falling
/// back to the current working directory.
fn data_dir_or_cwd() -> PathBuf {
    if let Some(base) = dirs::data_local_dir() {
        let d = base.join("TrigWatch").join("history");
        if std::fs::create_dir_all(&d).is_ok() {
            return d;
        }
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
