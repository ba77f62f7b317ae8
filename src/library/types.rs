use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Legacy single-variable placeholder.
pub const VAR_PLACEHOLDER: &str = "__VAR__";

/// What a library entry does when dispatched. Each variant carries only the
/// fields its type needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    /// Line-oriented script over the fixed input/process capability set.
    Script { code: String },
    Shell { command: String },
    Hotkey { keys: Vec<String> },
    Sequence {
        steps: Vec<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay_ms: Option<u64>,
    },
    Url { url: String },
    File { path: String },
    /// A `type` this build does not know; dispatching it is a reported failure.
    #[serde(other)]
    Unsupported,
}

impl CommandKind {
    pub fn label(&self) -> &'static str {
        match self {
            CommandKind::Script { .. } => "script",
            CommandKind::Shell { .. } => "shell",
            CommandKind::Hotkey { .. } => "hotkey",
            CommandKind::Sequence { .. } => "sequence",
            CommandKind::Url { .. } => "url",
            CommandKind::File { .. } => "file",
            CommandKind::Unsupported => "unsupported",
        }
    }

    /// All user-visible text carried by the entry, joined for inspection.
    pub fn text(&self) -> String {
        match self {
            CommandKind::Script { code } => code.clone(),
            CommandKind::Shell { command } => command.clone(),
            CommandKind::Hotkey { keys } => keys.join("+"),
            CommandKind::Sequence { steps, .. } => steps
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(","),
            CommandKind::Url { url } => url.clone(),
            CommandKind::File { path } => path.clone(),
            CommandKind::Unsupported => String::new(),
        }
    }

    /// True when any template field references `__VAR__` or `__VAR<n>__`.
    pub fn has_placeholder(&self) -> bool {
        match self {
            CommandKind::Hotkey { keys } => keys.iter().any(|k| k.contains("__VAR")),
            CommandKind::Sequence { .. } | CommandKind::Unsupported => false,
            other => other.text().contains("__VAR"),
        }
    }

    /// Rewrites every template field through `f`.
    pub fn map_text(&self, f: impl Fn(&str) -> String) -> CommandKind {
        match self {
            CommandKind::Script { code } => CommandKind::Script { code: f(code) },
            CommandKind::Shell { command } => CommandKind::Shell { command: f(command) },
            CommandKind::Hotkey { keys } => CommandKind::Hotkey {
                keys: keys.iter().map(|k| f(k)).collect(),
            },
            CommandKind::Sequence { .. } | CommandKind::Unsupported => self.clone(),
            CommandKind::Url { url } => CommandKind::Url { url: f(url) },
            CommandKind::File { path } => CommandKind::File { path: f(path) },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEntry {
    /// Filled from the library key on load; the file stores it only as the key.
    #[serde(default, skip_serializing)]
    pub name: String,
    pub id: u32,
    #[serde(flatten)]
    pub kind: CommandKind,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl CommandEntry {
    pub fn new(name: impl Into<String>, id: u32, kind: CommandKind) -> Self {
        Self {
            name: name.into(),
            id,
            kind,
            description: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_with_type_tag() {
        let entry = CommandEntry::new("copy", 110, CommandKind::Hotkey { keys: vec!["ctrl".into(), "c".into()] });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "hotkey");
        assert_eq!(json["keys"][1], "c");
        assert!(json.get("name").is_none());
    }

    #[test]
    fn sequence_delay_is_optional() {
        let json = r#"{"id": 7, "type": "sequence", "steps": [101, 102]}"#;
        let entry: CommandEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, CommandKind::Sequence { steps: vec![101, 102], delay_ms: None });
    }

    #[test]
    fn unknown_type_loads_as_unsupported() {
        let json = r#"{"id": 9, "type": "applescript", "code": "beep"}"#;
        let entry: CommandEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, CommandKind::Unsupported);
    }

    #[test]
    fn placeholder_detection_covers_numbered_tokens() {
        assert!(CommandKind::Script { code: "type \"__VAR2__\"".into() }.has_placeholder());
        assert!(CommandKind::Url { url: "https://x/?q=__VAR__".into() }.has_placeholder());
        assert!(!CommandKind::Script { code: "# aim".into() }.has_placeholder());
    }
}
