use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrigWatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Script error on line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("Safety violation: {0}")]
    SafetyViolation(String),

    #[error("Library error: {0}")]
    Library(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl TrigWatchError {
    /// Errors worth another attempt when talking to a model.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TrigWatchError::LlmProvider(_)
                | TrigWatchError::MalformedResponse(_)
                | TrigWatchError::Http(_)
                | TrigWatchError::Json(_)
        )
    }
}

pub type TrigWatchResult<T> = Result<T, TrigWatchError>;
