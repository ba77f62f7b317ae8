use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::errors::TrigWatchResult;
use crate::library::types::CommandKind;

/// Pauses longer than this are recorded as one second.
const MAX_RECORDED_PAUSE_SECS: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedStep {
    pub goal: String,
    pub instruction: CommandKind,
    pub pause_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Start(String),
    Continue(String),
    End,
    Play(String),
}

impl SessionCommand {
    pub fn parse(goal: &str) -> Option<Self> {
        let lower = goal.trim().to_lowercase();
        if let Some(rest) = lower.strip_prefix("start session") {
            Some(SessionCommand::Start(rest.trim().to_string()))
        } else if let Some(rest) = lower.strip_prefix("continue session") {
            Some(SessionCommand::Continue(rest.trim().to_string()))
        } else if lower == "end session" {
            Some(SessionCommand::End)
        } else if let Some(rest) = lower.strip_prefix("play session") {
            Some(SessionCommand::Play(rest.trim().to_string()))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Recording(String),
    Resumed(String),
    Saved(String),
    Play(Vec<RecordedStep>),
    Unknown(String),
}

struct ActiveRecording {
    name: String,
    steps: Vec<RecordedStep>,
    last_action: Instant,
}

/// Records dispatched steps into named sessions that can be replayed later.
pub struct SessionRecorder {
    path: Option<PathBuf>,
    sessions: BTreeMap<String, Vec<RecordedStep>>,
    active: Option<ActiveRecording>,
}

impl SessionRecorder {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sessions = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "sessions file unreadable; starting empty");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self {
            path: Some(path),
            sessions,
            active: None,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            sessions: BTreeMap::new(),
            active: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn handle(&mut self, command: SessionCommand) -> TrigWatchResult<SessionOutcome> {
        match command {
            SessionCommand::Start(name) => {
                tracing::info!(session = %name, "recording started");
                self.active = Some(ActiveRecording {
                    name: name.clone(),
                    steps: Vec::new(),
                    last_action: Instant::now(),
                });
                Ok(SessionOutcome::Recording(name))
            }
            SessionCommand::Continue(name) => match self.sessions.get(&name) {
                Some(steps) => {
                    tracing::info!(session = %name, steps = steps.len(), "recording resumed");
                    self.active = Some(ActiveRecording {
                        name: name.clone(),
                        steps: steps.clone(),
                        last_action: Instant::now(),
                    });
                    Ok(SessionOutcome::Resumed(name))
                }
                None => Ok(SessionOutcome::Unknown(name)),
            },
            SessionCommand::End => match self.active.take() {
                Some(rec) => {
                    tracing::info!(session = %rec.name, steps = rec.steps.len(), "recording saved");
                    self.sessions.insert(rec.name.clone(), rec.steps);
                    self.save()?;
                    Ok(SessionOutcome::Saved(rec.name))
                }
                None => Ok(SessionOutcome::Unknown(String::new())),
            },
            SessionCommand::Play(name) => match self.sessions.get(&name) {
                Some(steps) => Ok(SessionOutcome::Play(steps.clone())),
                None => Ok(SessionOutcome::Unknown(name)),
            },
        }
    }

    pub fn record(&mut self, goal: &str, instruction: &CommandKind) {
        self.record_at(goal, instruction, Instant::now());
    }

    fn record_at(&mut self, goal: &str, instruction: &CommandKind, now: Instant) {
        let Some(rec) = self.active.as_mut() else {
            return;
        };
        let mut pause = now.saturating_duration_since(rec.last_action).as_secs_f64();
        if pause > MAX_RECORDED_PAUSE_SECS {
            pause = 1.0;
        }
        rec.last_action = now;
        rec.steps.push(RecordedStep {
            goal: goal.to_string(),
            instruction: instruction.clone(),
            pause_secs: (pause * 100.0).round() / 100.0,
        });
        tracing::info!(session = %rec.name, step = rec.steps.len(), goal = %goal, "step recorded");
    }

    fn save(&self) -> TrigWatchResult<()> {
        if let Some(path) = &self.path {
            std::fs::write(path, serde_json::to_string_pretty(&self.sessions)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn hotkey() -> CommandKind {
        CommandKind::Hotkey { keys: vec!["enter".into()] }
    }

    #[test]
    fn parses_session_commands() {
        assert_eq!(SessionCommand::parse("Start Session Demo"), Some(SessionCommand::Start("demo".into())));
        assert_eq!(SessionCommand::parse("end session"), Some(SessionCommand::End));
        assert_eq!(SessionCommand::parse("play session demo"), Some(SessionCommand::Play("demo".into())));
        assert_eq!(SessionCommand::parse("open browser"), None);
    }

    #[test]
    fn record_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let mut rec = SessionRecorder::open(&path);

        rec.handle(SessionCommand::Start("demo".into())).unwrap();
        assert!(rec.is_recording());
        rec.record("press enter", &hotkey());
        rec.handle(SessionCommand::End).unwrap();
        assert!(!rec.is_recording());

        let mut reopened = SessionRecorder::open(&path);
        match reopened.handle(SessionCommand::Play("demo".into())).unwrap() {
            SessionOutcome::Play(steps) => {
                assert_eq!(steps.len(), 1);
                assert_eq!(steps[0].goal, "press enter");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn long_pauses_are_clamped() {
        let mut rec = SessionRecorder::in_memory();
        rec.handle(SessionCommand::Start("x".into())).unwrap();
        let later = Instant::now() + Duration::from_secs(120);
        rec.record_at("press enter", &hotkey(), later);
        rec.handle(SessionCommand::End).unwrap();
        match rec.handle(SessionCommand::Play("x".into())).unwrap() {
            SessionOutcome::Play(steps) => assert_eq!(steps[0].pause_secs, 1.0),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn recording_is_ignored_when_inactive() {
        let mut rec = SessionRecorder::in_memory();
        rec.record("press enter", &hotkey());
        assert_eq!(
            rec.handle(SessionCommand::Play("none".into())).unwrap(),
            SessionOutcome::Unknown("none".into())
        );
    }
}
