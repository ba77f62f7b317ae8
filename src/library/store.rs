use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{TrigWatchError, TrigWatchResult};
use crate::library::types::{CommandEntry, CommandKind};

pub const SCHEMA_VERSION: u32 = 2;

/// Learned entries get a random id in this range.
const LEARNED_ID_MIN: u32 = 1000;
const LEARNED_ID_MAX: u32 = 9999;

#[derive(Debug, Serialize, Deserialize)]
struct LibraryFile {
    schema_version: u32,
    commands: BTreeMap<String, CommandEntry>,
}

/// Persisted mapping of command name to execution template.
pub struct CommandLibrary {
    /// `None` keeps the library in memory only.
    path: Option<PathBuf>,
    /// Keys are lowercase; names are unique case-insensitively.
    commands: BTreeMap<String, CommandEntry>,
}

impl CommandLibrary {
    /// Opens the library at `path`. A missing, unreadable or unversioned file
    /// starts a fresh library seeded with the core commands.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut library = Self {
            path: Some(path.clone()),
            commands: BTreeMap::new(),
        };
        match load_file(&path) {
            Ok(Some(commands)) => {
                library.commands = commands;
                tracing::info!(path = %path.display(), entries = library.commands.len(), "command library loaded");
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "no command library found; seeding defaults");
                library.seed_defaults();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "command library unreadable; starting fresh");
                library.seed_defaults();
            }
        }
        library
    }

    /// An unpersisted library, empty until entries are inserted.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            commands: BTreeMap::new(),
        }
    }

    pub fn seed_defaults(&mut self) {
        for entry in default_entries() {
            self.commands.insert(entry.name.to_lowercase(), entry);
        }
        if let Err(e) = self.save() {
            tracing::error!(error = %e, "failed to save seeded library");
        }
    }

    pub fn save(&self) -> TrigWatchResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = LibraryFile {
            schema_version: SCHEMA_VERSION,
            commands: self.commands.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), entries = self.commands.len(), "command library saved");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.get(&name.trim().to_lowercase())
    }

    pub fn get_by_id(&self, id: u32) -> Option<&CommandEntry> {
        self.commands.values().find(|e| e.id == id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CommandEntry> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Adds or overwrites the entry stored under its (case-insensitive) name.
    /// Ids stay unique: another entry holding the same id is rejected.
    pub fn insert(&mut self, mut entry: CommandEntry) -> TrigWatchResult<()> {
        let key = entry.name.trim().to_lowercase();
        if key.is_empty() {
            return Err(TrigWatchError::Library("entry name is empty".into()));
        }
        if let Some(clash) = self.commands.iter().find(|(k, e)| e.id == entry.id && **k != key) {
            return Err(TrigWatchError::Library(format!(
                "id {} already belongs to '{}'",
                entry.id, clash.0
            )));
        }
        entry.name = key.clone();
        self.commands.insert(key, entry);
        self.save()
    }

    /// Persists a freshly resolved goal so the next identical goal skips
    /// re-planning. Returns the id assigned, or `None` when the goal is not
    /// learnable.
    pub fn learn(&mut self, goal: &str, kind: CommandKind) -> Option<u32> {
        let name = goal.trim().to_lowercase();
        if name.is_empty() || name.contains("session") {
            return None;
        }
        let id = match self.commands.get(&name) {
            Some(existing) => existing.id,
            None => self.fresh_learned_id()?,
        };
        let entry = CommandEntry::new(name.clone(), id, kind).with_description("learned");
        match self.insert(entry) {
            Ok(()) => {
                tracing::info!(goal = %name, id, "learned new command");
                Some(id)
            }
            Err(e) => {
                tracing::error!(goal = %name, error = %e, "failed to learn command");
                None
            }
        }
    }

    fn fresh_learned_id(&self) -> Option<u32> {
        let taken = |id: u32| self.commands.values().any(|e| e.id == id);
        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            let id = rng.gen_range(LEARNED_ID_MIN..=LEARNED_ID_MAX);
            if !taken(id) {
                return Some(id);
            }
        }
        (LEARNED_ID_MIN..=LEARNED_ID_MAX).find(|id| !taken(*id))
    }
}

/// `Ok(None)` means there is nothing usable on disk yet.
fn load_file(path: &Path) -> TrigWatchResult<Option<BTreeMap<String, CommandEntry>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let raw: serde_json::Value = serde_json::from_str(&content)?;
    if raw.get("schema_version").is_none() {
        tracing::warn!(path = %path.display(), "library has no schema_version");
        return Ok(None);
    }
    let file: LibraryFile = serde_json::from_value(raw)?;
    let commands = file
        .commands
        .into_iter()
        .map(|(name, mut entry)| {
            let key = name.to_lowercase();
            entry.name = key.clone();
            (key, entry)
        })
        .collect();
    Ok(Some(commands))
}

fn script(code: &str) -> CommandKind {
    CommandKind::Script { code: code.to_string() }
}

fn default_entries() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new("open app", 101, script("spawn \"__VAR__\""))
            .with_description("launch start run program application"),
        CommandEntry::new("type text", 102, script("type \"__VAR__\""))
            .with_description("write enter keyboard input text"),
        CommandEntry::new("click text", 103, script("# target located on screen"))
            .with_description("press button link select"),
        CommandEntry::new("minimize", 104, CommandKind::Hotkey { keys: vec!["win".into(), "d".into()] })
            .with_description("show desktop hide all windows"),
        CommandEntry::new("wait for text", 105, script("wait_for_text \"__VAR__\""))
            .with_description("pause until text appears on screen"),
        CommandEntry::new("press enter", 106, CommandKind::Hotkey { keys: vec!["enter".into()] })
            .with_description("submit send confirm key"),
        CommandEntry::new("note down", 107, script("batch \"__VAR__\""))
            .with_description("batch list goals notepad steps"),
        CommandEntry::new("double click text", 108, script("# target located on screen"))
            .with_description("open item icon"),
        CommandEntry::new("right click text", 109, script("# target located on screen"))
            .with_description("context menu"),
        CommandEntry::new("open website", 110, CommandKind::Url { url: "__VAR__".into() })
            .with_description("browser url link web page"),
    ]
}
