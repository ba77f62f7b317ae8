use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use serde::{Deserialize, Serialize};

use crate::errors::{TrigWatchError, TrigWatchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickKind {
    Left,
    Double,
    Right,
}

impl ClickKind {
    /// Script verb for this kind of click.
    pub fn verb(self) -> &'static str {
        match self {
            ClickKind::Left => "click",
            ClickKind::Double => "double_click",
            ClickKind::Right => "right_click",
        }
    }
}

/// Everything the executor may do to the desktop. Kept narrow so tests can
/// record calls instead of moving the real pointer.
pub trait DesktopDriver: Send + Sync {
    /// Presses every key in order, then releases them in reverse.
    fn press_combo(&self, keys: &[String]) -> TrigWatchResult<()>;
    fn click(&self, x: i32, y: i32, kind: ClickKind) -> TrigWatchResult<()>;
    fn move_mouse(&self, x: i32, y: i32) -> TrigWatchResult<()>;
    fn type_text(&self, text: &str) -> TrigWatchResult<()>;
    /// Starts a process without waiting for it.
    fn spawn_process(&self, argv: &[String]) -> TrigWatchResult<()>;
    fn open_url(&self, url: &str) -> TrigWatchResult<()>;
    fn open_file(&self, path: &str) -> TrigWatchResult<()>;
    fn screen_size(&self) -> TrigWatchResult<(i32, i32)>;
}

/// Real keyboard, mouse and process control.
#[derive(Debug, Default)]
pub struct SystemDesktop;

impl SystemDesktop {
    pub fn new() -> Self {
        Self
    }

    fn enigo() -> TrigWatchResult<Enigo> {
        Enigo::new(&Settings::default())
            .map_err(|e| TrigWatchError::Executor(format!("input backend unavailable: {e}")))
    }
}

fn input_err(e: impl std::fmt::Display) -> TrigWatchError {
    TrigWatchError::Executor(format!("input failed: {e}"))
}

impl DesktopDriver for SystemDesktop {
    fn press_combo(&self, keys: &[String]) -> TrigWatchResult<()> {
        if keys.is_empty() {
            return Err(TrigWatchError::Executor("no keys specified".into()));
        }
        let parsed = keys
            .iter()
            .map(|k| parse_key(k).ok_or_else(|| TrigWatchError::Executor(format!("unknown key `{k}`"))))
            .collect::<TrigWatchResult<Vec<Key>>>()?;

        let mut enigo = Self::enigo()?;
        tracing::debug!(keys = %keys.join("+"), "pressing key combination");
        for key in &parsed {
            enigo.key(*key, Direction::Press).map_err(input_err)?;
        }
        for key in parsed.iter().rev() {
            enigo.key(*key, Direction::Release).map_err(input_err)?;
        }
        Ok(())
    }

    fn click(&self, x: i32, y: i32, kind: ClickKind) -> TrigWatchResult<()> {
        let mut enigo = Self::enigo()?;
        enigo.move_mouse(x, y, Coordinate::Abs).map_err(input_err)?;
        match kind {
            ClickKind::Left => enigo.button(Button::Left, Direction::Click).map_err(input_err)?,
            ClickKind::Right => enigo.button(Button::Right, Direction::Click).map_err(input_err)?,
            ClickKind::Double => {
                enigo.button(Button::Left, Direction::Click).map_err(input_err)?;
                enigo.button(Button::Left, Direction::Click).map_err(input_err)?;
            }
        }
        tracing::debug!(x, y, kind = kind.verb(), "clicked");
        Ok(())
    }

    fn move_mouse(&self, x: i32, y: i32) -> TrigWatchResult<()> {
        let mut enigo = Self::enigo()?;
        enigo.move_mouse(x, y, Coordinate::Abs).map_err(input_err)
    }

    fn type_text(&self, text: &str) -> TrigWatchResult<()> {
        let mut enigo = Self::enigo()?;
        enigo.text(text).map_err(input_err)
    }

    fn spawn_process(&self, argv: &[String]) -> TrigWatchResult<()> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| TrigWatchError::Executor("empty command line".into()))?;
        std::process::Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| TrigWatchError::Executor(format!("failed to start `{program}`: {e}")))?;
        Ok(())
    }

    fn open_url(&self, url: &str) -> TrigWatchResult<()> {
        webbrowser::open(url).map_err(|e| TrigWatchError::Executor(format!("failed to open {url}: {e}")))
    }

    fn open_file(&self, path: &str) -> TrigWatchResult<()> {
        open::that(path).map_err(|e| TrigWatchError::Executor(format!("failed to open {path}: {e}")))
    }

    fn screen_size(&self) -> TrigWatchResult<(i32, i32)> {
        let enigo = Self::enigo()?;
        enigo.main_display().map_err(input_err)
    }
}

/// Maps a key name from a hotkey entry to an enigo key.
pub fn parse_key(name: &str) -> Option<Key> {
    let lower = name.trim().to_lowercase();
    let key = match lower.as_str() {
        "ctrl" | "control" => Key::Control,
        "alt" => Key::Alt,
        "shift" => Key::Shift,
        "win" | "windows" | "meta" | "super" | "cmd" | "command" => Key::Meta,
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "esc" | "escape" => Key::Escape,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "pgup" => Key::PageUp,
        "pagedown" | "pgdn" => Key::PageDown,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        _ => {
            let mut chars = lower.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => return None,
            }
        }
    };
    Some(key)
}
