use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{TrigWatchError, TrigWatchResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sentinel: SentinelConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub anchor: AnchorConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub perception: PerceptionConfig,
    #[serde(default)]
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub active_provider: String,
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "ollama".to_string(),
            ProviderEntry {
                display_name: "Ollama (local)".to_string(),
                api_base: "http://localhost:11434/v1/chat/completions".to_string(),
                model: "gemma3:4b".to_string(),
                temperature: default_temperature(),
                api_key: None,
            },
        );
        Self {
            active_provider: "ollama".to_string(),
            providers,
            roles: RolesConfig::default(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Optional API key stored in config.toml (falls back to env var TRIGWATCH_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Maps planner roles to specific provider+model combinations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Picks one command id out of the filtered candidate list.
    pub selector: Option<RoleEntry>,
    /// Suggests keywords when the goal matches nothing in the library.
    pub keywords: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API.
    pub model: String,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
}

fn default_temperature() -> f64 {
    0.1
}

fn default_request_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub loop_delay_ms: u64,
    /// Number of observations kept in the rolling trigger buffer.
    pub history_cycles: usize,
    pub wait_timeout_secs: u64,
    pub wait_poll_ms: u64,
    /// Program launched as the scratch document for batch routines.
    pub scratch_editor: String,
    pub scratch_open_delay_ms: u64,
    /// Write every dispatched marker to a JSONL history file.
    pub record_history: bool,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            loop_delay_ms: 200,
            history_cycles: 5,
            wait_timeout_secs: 30,
            wait_poll_ms: 1000,
            scratch_editor: "notepad".to_string(),
            scratch_open_delay_ms: 1000,
            record_history: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub max_retries: u32,
    pub retry_pause_ms: u64,
    pub max_candidates: usize,
    /// Entries with an id below this are offered when nothing else matches.
    pub core_id_threshold: u32,
    pub aim_similarity_floor: f32,
    pub reflex_verbs: Vec<String>,
    /// Verbs after which a lone " I " is read as the "|" separator.
    pub separator_verbs: Vec<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_pause_ms: 500,
            max_candidates: 15,
            core_id_threshold: 200,
            aim_similarity_floor: 0.8,
            reflex_verbs: vec!["cmd".into(), "powershell".into(), "echo".into()],
            separator_verbs: vec!["type".into(), "write".into(), "search".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Default pause between sequence steps when the entry does not set one.
    pub sequence_delay_ms: u64,
    /// Shell used for `shell` entries and `spawn` lines. Empty picks the platform default.
    pub shell: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            sequence_delay_ms: 500,
            shell: Vec::new(),
        }
    }
}

impl ExecutorConfig {
    pub fn shell_argv(&self) -> Vec<String> {
        if !self.shell.is_empty() {
            return self.shell.clone();
        }
        if cfg!(target_os = "windows") {
            vec!["cmd".into(), "/C".into()]
        } else {
            vec!["sh".into(), "-c".into()]
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_true")]
    pub allow_shell: bool,
    #[serde(default)]
    pub blocked_patterns: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            allow_shell: true,
            blocked_patterns: Vec::new(),
        }
    }
}

/// Where focus goes back to after a dispatched action.
/// `target` forms: `tab`, `window:<title>`, `search:<text>`. Empty disables it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    pub target: String,
    pub settle_ms: u64,
    /// Pixels above the bottom edge where the chat input is clicked.
    pub input_offset_px: i32,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            settle_ms: 500,
            input_offset_px: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// 0 disables the watchdog.
    pub idle_timeout_secs: u64,
    /// Library entries run in order once the loop has been idle too long.
    pub entry_ids: Vec<u32>,
    pub step_delay_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 0,
            entry_ids: Vec::new(),
            step_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PerceptionConfig {
    /// OCR helper printing a JSON array of `{text, x, y}` on stdout.
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub path: PathBuf,
    pub sessions_path: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("command_library.json"),
            sessions_path: PathBuf::from("sessions.json"),
        }
    }
}

fn default_true() -> bool {
    true
}

fn resolve_config_path() -> TrigWatchResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(TrigWatchError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

/// Load `config.toml` from an explicit path, or search the usual locations.
pub fn load_config(explicit: Option<&Path>) -> TrigWatchResult<AppConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => resolve_config_path()?,
    };
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

pub fn parse_config(content: &str) -> TrigWatchResult<AppConfig> {
    Ok(toml::from_str(content)?)
}

pub fn save_config(config: &AppConfig, path: &Path) -> TrigWatchResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.sentinel.history_cycles, 5);
        assert_eq!(cfg.planner.max_retries, 2);
        assert_eq!(cfg.planner.core_id_threshold, 200);
        assert_eq!(cfg.llm.active_provider, "ollama");
        assert!(cfg.safety.allow_shell);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse_config(
            r#"
            [planner]
            max_retries = 4

            [anchor]
            target = "tab"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.planner.max_retries, 4);
        assert_eq!(cfg.planner.max_candidates, 15);
        assert_eq!(cfg.anchor.target, "tab");
        assert_eq!(cfg.anchor.input_offset_px, 100);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.watchdog.idle_timeout_secs = 45;
        save_config(&cfg, &path).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.watchdog.idle_timeout_secs, 45);
        assert_eq!(loaded.library.path, PathBuf::from("command_library.json"));
    }
}
