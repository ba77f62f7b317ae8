use crate::library::variables::{reference_pattern, VariableStore};

/// A goal with its inline variable pulled out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedGoal {
    pub goal: String,
    pub variable: String,
}

/// Splits `goal | variable`, repairs the OCR misread of `|` as ` I ` after a
/// text-entry verb, and resolves `$V<n>` references.
///
/// A `$V<n>` token inside the goal itself replaces any inline variable and is
/// removed from the goal text.
pub fn split_goal(raw: &str, separator_verbs: &[String], variables: &VariableStore) -> ParsedGoal {
    let raw = raw.trim();
    let (mut goal, mut variable) = match raw.split_once('|') {
        Some((goal, var)) => (goal.trim().to_string(), truncate_quoted(var.trim())),
        None if raw.contains(" I ") && starts_with_any(raw, separator_verbs) => {
            let (goal, var) = raw.split_once(" I ").unwrap_or((raw, ""));
            tracing::debug!(goal = %goal, "read standalone 'I' as the variable separator");
            (goal.trim().to_string(), truncate_quoted(var.trim()))
        }
        None => (raw.to_string(), String::new()),
    };

    variable = variables.resolve(&variable);

    if let Some(caps) = reference_pattern().captures(&goal) {
        variable = variables.get(&caps[1]);
        goal = reference_pattern()
            .replace_all(&goal, "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
    }

    ParsedGoal { goal, variable }
}

fn starts_with_any(text: &str, verbs: &[String]) -> bool {
    let lower = text.to_lowercase();
    verbs.iter().any(|v| lower.starts_with(&v.to_lowercase()))
}

/// A variable that opens with a quote ends at the matching close quote;
/// whatever OCR picked up after it is dropped.
fn truncate_quoted(var: &str) -> String {
    let mut chars = var.chars();
    let close = match chars.next() {
        Some('"') => '"',
        Some('\'') => '\'',
        Some('\u{201C}') => '\u{201D}',
        _ => return var.to_string(),
    };
    let rest = chars.as_str();
    match rest.find(close) {
        Some(end) => rest[..end].to_string(),
        None => var.to_string(),
    }
}
