use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{TrigWatchError, TrigWatchResult};
use crate::llm::types::Selection;

fn fenced_json() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(\{.*\})\s*```").expect("valid regex"))
}

/// Pulls the JSON object out of a model reply: a fenced ```json block, else
/// everything between the first `{` and the last `}`, else the text as-is.
pub fn extract_json(text: &str) -> &str {
    if let Some(caps) = fenced_json().captures(text) {
        if let Some(m) = caps.get(1) {
            return m.as_str();
        }
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Parses the selector reply and checks the id against the offered set.
/// Anything unusable is a `MalformedResponse`, which the caller retries.
pub fn parse_selection(content: &str, offered: &HashSet<u32>) -> TrigWatchResult<Selection> {
    let value: serde_json::Value = serde_json::from_str(extract_json(content))
        .map_err(|e| TrigWatchError::MalformedResponse(format!("selector reply is not JSON: {e}")))?;

    let id = match &value["id"] {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .and_then(|id| u32::try_from(id).ok())
    .ok_or_else(|| TrigWatchError::MalformedResponse(format!("selector reply has no usable id: {content}")))?;

    if !offered.contains(&id) {
        return Err(TrigWatchError::MalformedResponse(format!(
            "selector picked id {id}, which was not offered"
        )));
    }

    let var = match &value["var"] {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };

    Ok(Selection { id, var })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offered() -> HashSet<u32> {
        [101, 102].into_iter().collect()
    }

    #[test]
    fn extracts_fenced_and_embedded_objects() {
        assert_eq!(extract_json("```json\n{\"id\": 1}\n```"), "{\"id\": 1}");
        assert_eq!(extract_json("Sure! {\"id\": 2} hope that helps"), "{\"id\": 2}");
        assert_eq!(extract_json("nothing here"), "nothing here");
    }

    #[test]
    fn accepts_numeric_and_string_ids() {
        let sel = parse_selection("{\"id\": 102, \"var\": \"hello\"}", &offered()).unwrap();
        assert_eq!(sel, Selection { id: 102, var: "hello".into() });
        let sel = parse_selection("{\"id\": \"101\"}", &offered()).unwrap();
        assert_eq!(sel, Selection { id: 101, var: String::new() });
    }

    #[test]
    fn rejects_unoffered_or_missing_ids() {
        assert!(matches!(
            parse_selection("{\"id\": 999}", &offered()),
            Err(TrigWatchError::MalformedResponse(_))
        ));
        assert!(parse_selection("{\"var\": \"x\"}", &offered()).is_err());
        assert!(parse_selection("not json", &offered()).is_err());
    }
}
