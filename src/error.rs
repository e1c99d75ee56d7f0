//! Custom error types for release-notes-hook.

use thiserror::Error;

/// Main error type for release note generation.
#[derive(Error, Debug)]
pub enum ReleaseNotesError {
    // Cli args errors
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Trigger payload errors
    #[error("Invalid release payload: {0}")]
    InvalidPayload(String),

    // Backend errors
    #[error("No repository found for project '{project}'")]
    NoRepository { project: String },

    #[error("Repository '{repository}' not found in project '{project}'")]
    RepositoryNotFound { project: String, repository: String },

    #[error("Work item #{id} is missing field '{field}'")]
    MissingField { id: i64, field: String },

    #[error("Backend operation failed: {0}")]
    BackendError(String),

    // Storage errors
    #[error("Storage operation failed: {0}")]
    StorageError(String),

    // Network/API errors
    #[error("Network request failed: {0}")]
    NetworkError(String),

    #[error("API authentication failed: {0}")]
    AuthenticationError(String),

    #[error("API rate limit exceeded")]
    RateLimitExceeded,

    // JSON parsing errors
    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("Datetime parse error: {0}")]
    ChronoParseError(#[from] chrono::ParseError),

    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    // Generic wrapper for other errors
    #[error(transparent)]
    Other(#[from] color_eyre::Report),
}

/// Result type alias using ReleaseNotesError
pub type Result<T> = std::result::Result<T, ReleaseNotesError>;

impl ReleaseNotesError {
    /// Create a backend error with context
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendError(msg.into())
    }

    /// Create a storage error with context
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a missing work item field error
    pub fn missing_field(id: i64, field: impl Into<String>) -> Self {
        Self::MissingField {
            id,
            field: field.into(),
        }
    }

    /// Whether the error was caused by the caller's request rather than by
    /// a collaborator failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidPayload(_))
    }
}

// I/O failures outside storage writes surface as generic errors
impl From<std::io::Error> for ReleaseNotesError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(color_eyre::Report::from(err))
    }
}

// Implement From for reqwest errors (network/API)
impl From<reqwest::Error> for ReleaseNotesError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::NetworkError(err.to_string())
        } else if err.is_status() {
            if let Some(status) = err.status() {
                if status.as_u16() == 401 || status.as_u16() == 403 {
                    Self::AuthenticationError(err.to_string())
                } else if status.as_u16() == 429 {
                    Self::RateLimitExceeded
                } else {
                    Self::NetworkError(err.to_string())
                }
            } else {
                Self::NetworkError(err.to_string())
            }
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

// Implement From for reqwest header errors (needs custom message)
impl From<reqwest::header::InvalidHeaderValue> for ReleaseNotesError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Self::AuthenticationError(format!("Invalid header value: {}", err))
    }
}
