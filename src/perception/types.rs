use serde::{Deserialize, Serialize};

/// One piece of recognised text and the screen point at its centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub x: i32,
    pub y: i32,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, x: i32, y: i32) -> Self {
        Self { text: text.into(), x, y }
    }
}

/// Result of one perception pass over the watched region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Observation {
    pub fragments: Vec<TextFragment>,
    pub full_text: String,
}

impl Observation {
    /// Builds the concatenated text the way the trigger buffer expects it.
    pub fn from_fragments(fragments: Vec<TextFragment>) -> Self {
        let full_text = fragments
            .iter()
            .map(|f| f.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self { fragments, full_text }
    }

    pub fn is_empty(&self) -> bool {
        self.full_text.trim().is_empty()
    }
}
