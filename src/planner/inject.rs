use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::executor::script;
use crate::library::types::CommandKind;
use crate::library::variables::VariableStore;

/// `__VAR__` (group empty) or `__VAR<n>__`.
fn placeholder_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"__VAR(\d*)__").expect("valid regex"))
}

/// Escapes a value for a double-quoted shell word.
pub fn shell_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '`' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Fills `__VAR__` with `variable` and `__VAR<n>__` with stored variable `n`,
/// escaped for the context the text will run in. Substitution is a single
/// pass, so injected values are never re-scanned for placeholders.
pub fn inject(kind: &CommandKind, variable: &str, variables: &VariableStore) -> CommandKind {
    let escape: fn(&str) -> String = match kind {
        CommandKind::Script { .. } => script::escape,
        CommandKind::Shell { .. } => shell_escape,
        _ => str::to_string,
    };

    kind.map_text(|text| {
        placeholder_pattern()
            .replace_all(text, |caps: &Captures| {
                let value = if caps[1].is_empty() {
                    if variable.is_empty() {
                        tracing::warn!("template expects __VAR__ but no variable was given");
                    }
                    variable.to_string()
                } else {
                    variables.get(&caps[1])
                };
                escape(&value)
            })
            .into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::script::tokenize;

    #[test]
    fn script_values_stay_inside_their_quotes() {
        let kind = CommandKind::Script { code: "type \"__VAR__\"".into() };
        let filled = inject(&kind, "say \"hi\" C:\\x", &VariableStore::new());
        let CommandKind::Script { code } = filled else { panic!("kind changed") };
        assert_eq!(tokenize(&code).unwrap()[1], "say \"hi\" C:\\x");
    }

    #[test]
    fn shell_values_are_escaped() {
        let kind = CommandKind::Shell { command: "echo \"__VAR__\"".into() };
        let filled = inject(&kind, "$HOME `id`", &VariableStore::new());
        assert_eq!(filled, CommandKind::Shell { command: "echo \"\\$HOME \\`id\\`\"".into() });
    }

    #[test]
    fn numbered_placeholders_read_the_store() {
        let mut vars = VariableStore::new();
        vars.set("2", "world");
        let kind = CommandKind::Url { url: "https://x.test/?a=__VAR__&b=__VAR2__&c=__VAR7__".into() };
        let filled = inject(&kind, "hello", &vars);
        assert_eq!(filled, CommandKind::Url { url: "https://x.test/?a=hello&b=world&c=".into() });
    }

    #[test]
    fn injected_values_are_not_rescanned() {
        let mut vars = VariableStore::new();
        vars.set("1", "secret");
        let kind = CommandKind::Url { url: "__VAR__".into() };
        let filled = inject(&kind, "__VAR1__", &vars);
        assert_eq!(filled, CommandKind::Url { url: "__VAR1__".into() });
    }
}
