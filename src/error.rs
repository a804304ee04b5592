//! Error types shared by the detection pipeline and the playback controller

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, SkipError>;

/// Error types for pipeline operations
#[derive(thiserror::Error, Debug)]
pub enum SkipError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Playback surface error: {0}")]
    Surface(String),

    #[error("Parsing error: {0}")]
    Parse(String),
}
