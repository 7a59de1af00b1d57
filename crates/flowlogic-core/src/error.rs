use thiserror::Error;

/// Import text that is not JSON at all. The session is left untouched.
#[derive(Debug, Error)]
#[error("Invalid JSON: {0}")]
pub struct ImportError(#[from] pub serde_json::Error);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("Node '{0}' not found")]
    NotFound(String),

    #[error("Node '{id}' is a {actual} node, expected {expected}")]
    WrongKind {
        id: String,
        expected: &'static str,
        actual: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
