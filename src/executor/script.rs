use crate::errors::{TrigWatchError, TrigWatchResult};
use crate::executor::input::ClickKind;

/// One line of a `script` entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Type(String),
    Press(String),
    Hotkey(Vec<String>),
    Click { x: i32, y: i32, kind: ClickKind },
    Move { x: i32, y: i32 },
    Spawn(String),
    Sleep(u64),
    OpenUrl(String),
    OpenFile(String),
    Echo(String),
    /// Pseudo-instruction handled by the sentinel loop, never by the executor.
    WaitForText(String),
    /// Pseudo-instruction handled by the sentinel loop, never by the executor.
    Batch(String),
}

/// Wraps `value` in double quotes so it survives [`tokenize`] unchanged.
pub fn quote(value: &str) -> String {
    format!("\"{}\"", escape(value))
}

/// Escapes backslashes, quotes and control characters for use inside a
/// double-quoted script argument.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Splits a line into whitespace-separated words. Double-quoted words may
/// contain spaces and the escapes produced by [`escape`]; any other escape
/// keeps its backslash.
pub fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut token = String::new();
        if c == '"' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some('n') => token.push('\n'),
                        Some('r') => token.push('\r'),
                        Some('t') => token.push('\t'),
                        Some('\\') => token.push('\\'),
                        Some('"') => token.push('"'),
                        Some(other) => {
                            token.push('\\');
                            token.push(other);
                        }
                        None => token.push('\\'),
                    },
                    other => token.push(other),
                }
            }
            if !closed {
                return Err("unterminated quoted argument".into());
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}

/// Parses a whole script. Blank lines and `#` comments are skipped; the first
/// bad line aborts parsing with its 1-based line number.
pub fn parse_script(code: &str) -> TrigWatchResult<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (idx, raw) in code.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step = parse_line(line).map_err(|message| TrigWatchError::Script { line: idx + 1, message })?;
        steps.push(step);
    }
    Ok(steps)
}

/// The first executable line of a script, if it parses.
pub fn first_step(code: &str) -> Option<ScriptStep> {
    code.lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .and_then(|l| parse_line(l).ok())
}

fn parse_line(line: &str) -> Result<ScriptStep, String> {
    let tokens = tokenize(line)?;
    let Some((verb, args)) = tokens.split_first() else {
        return Err("empty line".into());
    };

    let text = || -> Result<String, String> {
        if args.is_empty() {
            Err(format!("`{verb}` needs an argument"))
        } else {
            Ok(args.join(" "))
        }
    };

    match verb.to_lowercase().as_str() {
        "type" => Ok(ScriptStep::Type(text()?)),
        "press" => Ok(ScriptStep::Press(text()?)),
        "hotkey" => {
            let keys: Vec<String> = args
                .iter()
                .flat_map(|a| a.split('+'))
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
            if keys.is_empty() {
                return Err("`hotkey` needs at least one key".into());
            }
            Ok(ScriptStep::Hotkey(keys))
        }
        "click" => point(args).map(|(x, y)| ScriptStep::Click { x, y, kind: ClickKind::Left }),
        "double_click" => point(args).map(|(x, y)| ScriptStep::Click { x, y, kind: ClickKind::Double }),
        "right_click" => point(args).map(|(x, y)| ScriptStep::Click { x, y, kind: ClickKind::Right }),
        "move" => point(args).map(|(x, y)| ScriptStep::Move { x, y }),
        "spawn" => Ok(ScriptStep::Spawn(text()?)),
        "sleep" => {
            let ms = args
                .first()
                .ok_or("`sleep` needs milliseconds")?
                .parse::<u64>()
                .map_err(|e| format!("bad sleep duration: {e}"))?;
            Ok(ScriptStep::Sleep(ms))
        }
        "open_url" => Ok(ScriptStep::OpenUrl(text()?)),
        "open_file" => Ok(ScriptStep::OpenFile(text()?)),
        "echo" => Ok(ScriptStep::Echo(args.join(" "))),
        "wait_for_text" => Ok(ScriptStep::WaitForText(text()?)),
        "batch" => Ok(ScriptStep::Batch(text()?)),
        other => Err(format!("unknown verb `{other}`")),
    }
}

fn point(args: &[String]) -> Result<(i32, i32), String> {
    match args {
        [x, y] => {
            let x = x.parse::<i32>().map_err(|e| format!("bad x coordinate: {e}"))?;
            let y = y.parse::<i32>().map_err(|e| format!("bad y coordinate: {e}"))?;
            Ok((x, y))
        }
        _ => Err("expected two coordinates".into()),
    }
}
