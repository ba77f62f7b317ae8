use std::collections::HashSet;

use crate::errors::{TrigWatchError, TrigWatchResult};
use crate::library::types::CommandEntry;
use crate::llm::types::KeywordSuggestion;
use crate::planner::parse::extract_json;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "to", "for", "on", "in", "with", "and", "or", "is", "it", "my", "me", "i",
];

pub const KEYWORD_PROMPT: &str = "Given this user goal, output 3-5 single-word keywords that might match automation commands.\n\
Return JSON: {\"keywords\": [\"word1\", \"word2\", ...]}\n\
Examples: 'open browser' -> [\"open\", \"browser\", \"chrome\", \"web\"]\n\
'save file' -> [\"save\", \"file\", \"ctrl\", \"document\"]";

/// A library entry offered to the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: u32,
    pub name: String,
    pub score: usize,
}

/// Lowercase words of the goal minus stopwords.
pub fn goal_keywords(goal: &str) -> HashSet<String> {
    goal.to_lowercase()
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Name overlap counts fully, description overlap at half weight (floored).
pub fn score(keywords: &HashSet<String>, entry: &CommandEntry) -> usize {
    let overlap = |text: &str| {
        text.to_lowercase()
            .split_whitespace()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter(|w| keywords.contains(*w))
            .count()
    };
    overlap(&entry.name) + overlap(&entry.description) / 2
}

/// Every entry scoring above zero.
pub fn rank<'a>(entries: impl Iterator<Item = &'a CommandEntry>, keywords: &HashSet<String>) -> Vec<Candidate> {
    entries
        .filter_map(|e| {
            let score = score(keywords, e);
            (score > 0).then(|| Candidate {
                id: e.id,
                name: e.name.clone(),
                score,
            })
        })
        .collect()
}

/// Core commands offered when no keyword matches at all.
pub fn core_fallback<'a>(entries: impl Iterator<Item = &'a CommandEntry>, threshold: u32) -> Vec<Candidate> {
    entries
        .filter(|e| e.id < threshold)
        .map(|e| Candidate {
            id: e.id,
            name: e.name.clone(),
            score: 0,
        })
        .collect()
}

/// Best first, ties by ascending id, at most `max` entries.
pub fn cap(mut candidates: Vec<Candidate>, max: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
    candidates.truncate(max);
    candidates
}

/// Parses the keyword role's reply into a lowercase keyword set.
pub fn parse_suggestion(content: &str) -> TrigWatchResult<HashSet<String>> {
    let suggestion: KeywordSuggestion = serde_json::from_str(extract_json(content))
        .map_err(|e| TrigWatchError::MalformedResponse(format!("keyword reply is not JSON: {e}")))?;
    Ok(suggestion
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect())
}
