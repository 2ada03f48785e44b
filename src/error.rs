//! Custom error types for assayer

use thiserror::Error;

/// Main error type for assayer operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    /// An external provider (classifier/embedder) could not be reached after
    /// retries. Callers surface this as an explicit unavailable result rather
    /// than substituting a default label or score.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Validation error in field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Invalid rule definition: {0}")]
    RuleDefinition(String),

    #[error("Scoring error: {0}")]
    Scoring(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Chunk not found: {0}")]
    ChunkNotFound(String),

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("Not initialized: run 'assayer init' first")]
    NotInitialized,

    #[error("Already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl Error {
    /// Build a validation error for a named field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for assayer
pub type Result<T> = std::result::Result<T, Error>;
