use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

/// Per-call settings resolved from a role.
#[derive(Debug, Clone)]
pub struct CallConfig {
    pub model: String,
    pub temperature: f64,
    /// Ask the provider for a JSON object response.
    pub json_mode: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: String,
}

/// `{"id": <number>, "var": "..."}` from the selector role.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub id: u32,
    pub var: String,
}

/// `{"keywords": [...]}` from the keywords role.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeywordSuggestion {
    #[serde(default)]
    pub keywords: Vec<String>,
}
