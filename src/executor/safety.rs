use crate::config::SafetyConfig;
use crate::errors::{TrigWatchError, TrigWatchResult};
use crate::library::types::CommandKind;

/// Rejects commands the configuration does not allow to run.
pub fn check(kind: &CommandKind, cfg: &SafetyConfig) -> TrigWatchResult<()> {
    if !cfg.allow_shell && starts_processes(kind) {
        return Err(TrigWatchError::SafetyViolation(format!(
            "{} command starts a process and shell access is disabled",
            kind.label()
        )));
    }

    let text = kind.text().to_lowercase();
    if let Some(pattern) = cfg
        .blocked_patterns
        .iter()
        .find(|p| !p.is_empty() && text.contains(&p.to_lowercase()))
    {
        return Err(TrigWatchError::SafetyViolation(format!("blocked pattern `{pattern}`")));
    }
    Ok(())
}

fn starts_processes(kind: &CommandKind) -> bool {
    match kind {
        CommandKind::Shell { .. } => true,
        CommandKind::Script { code } => code
            .lines()
            .any(|l| l.trim_start().to_lowercase().starts_with("spawn")),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(allow_shell: bool, blocked: &[&str]) -> SafetyConfig {
        SafetyConfig {
            allow_shell,
            blocked_patterns: blocked.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn shell_needs_permission() {
        let shell = CommandKind::Shell { command: "dir".into() };
        assert!(check(&shell, &cfg(true, &[])).is_ok());
        assert!(matches!(check(&shell, &cfg(false, &[])), Err(TrigWatchError::SafetyViolation(_))));
    }

    #[test]
    fn spawn_lines_count_as_shell() {
        let script = CommandKind::Script { code: "type \"x\"\nspawn \"calc\"".into() };
        assert!(check(&script, &cfg(false, &[])).is_err());
        let typing = CommandKind::Script { code: "type \"spawn\"".into() };
        assert!(check(&typing, &cfg(false, &[])).is_ok());
    }

    #[test]
    fn blocked_patterns_ignore_case() {
        let shell = CommandKind::Shell { command: "Format C:".into() };
        assert!(check(&shell, &cfg(true, &["format c:"])).is_err());
        assert!(check(&shell, &cfg(true, &["rm -rf"])).is_ok());
    }
}
