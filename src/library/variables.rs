use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use regex::Regex;

/// `&&VAR <id> <content> VAR&&`, content may span lines.
fn definition_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)&&VAR\s*(\d+)\s+(.*?)\s*VAR&&").expect("valid regex"))
}

/// `$V<id>` reference token.
pub fn reference_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$V(\d+)").expect("valid regex"))
}

/// Named text fragments that markers reference out-of-band.
#[derive(Debug, Default)]
pub struct VariableStore {
    values: HashMap<String, String>,
    seen: HashSet<u64>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `id`. Re-setting an identical pair is ignored.
    /// Returns whether anything changed.
    pub fn set(&mut self, id: &str, value: &str) -> bool {
        let hash = content_hash(id, value);
        if !self.seen.insert(hash) {
            return false;
        }
        self.values.insert(id.to_string(), value.to_string());
        tracing::info!(var = %format!("$V{id}"), value = %preview(value), "variable set");
        true
    }

    /// Returns the stored value or an empty string (with a warning).
    pub fn get(&self, id: &str) -> String {
        match self.values.get(id) {
            Some(v) if !v.is_empty() => v.clone(),
            _ => {
                tracing::warn!(var = %format!("$V{id}"), "variable not found");
                String::new()
            }
        }
    }

    /// Picks up every variable definition span in observed text.
    pub fn parse_from_text(&mut self, text: &str) -> usize {
        let mut changed = 0;
        for caps in definition_pattern().captures_iter(text) {
            if self.set(&caps[1], caps[2].trim()) {
                changed += 1;
            }
        }
        changed
    }

    /// Replaces every `$V<id>` token with its stored value.
    pub fn resolve(&self, text: &str) -> String {
        reference_pattern()
            .replace_all(text, |caps: &regex::Captures| self.get(&caps[1]))
            .into_owned()
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.seen.clear();
        tracing::info!("variable store cleared");
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn content_hash(id: &str, value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    value.hash(&mut hasher);
    hasher.finish()
}

fn preview(value: &str) -> String {
    let flat = value.replace('\n', " ");
    if flat.chars().count() > 50 {
        format!("{}...", flat.chars().take(50).collect::<String>())
    } else {
        flat
    }
}
