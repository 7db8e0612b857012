//! Error types and handlers for mirror operations

pub mod handlers;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum MirrorError {
    /// Network related errors
    #[error("Network error: {0}")]
    Network(String),
    /// Registry answered with an unexpected status or body
    #[error("Registry error: {0}")]
    Registry(String),
    /// Registry refused the request because of its rate limit
    #[error("Rate limited: {0}")]
    RateLimited(String),
    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),
    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
    /// The external copy tool failed for one tag
    #[error("Transfer of {reference} failed: {message}")]
    Transfer { reference: String, message: String },
    /// File IO errors
    #[error("IO error: {0}")]
    Io(String),
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// A per-image worker panicked
    #[error("Worker panicked: {0}")]
    WorkerPanic(String),
    /// No worker slot could be obtained for an image
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl MirrorError {
    /// Whether this error leaves the remote state unknown (as opposed to a
    /// definite answer such as "does not exist").
    pub fn is_inconclusive(&self) -> bool {
        !matches!(self, MirrorError::NotFound(_))
    }
}

impl From<std::io::Error> for MirrorError {
    fn from(err: std::io::Error) -> Self {
        MirrorError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MirrorError {
    fn from(err: serde_json::Error) -> Self {
        MirrorError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for MirrorError {
    fn from(err: reqwest::Error) -> Self {
        handlers::NetworkErrorHandler::handle_network_error(&err, "request")
    }
}

impl From<url::ParseError> for MirrorError {
    fn from(err: url::ParseError) -> Self {
        MirrorError::Validation(err.to_string())
    }
}

impl From<chrono::ParseError> for MirrorError {
    fn from(err: chrono::ParseError) -> Self {
        MirrorError::Parse(format!("invalid timestamp: {}", err))
    }
}

impl From<std::string::FromUtf8Error> for MirrorError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        MirrorError::Parse(format!("UTF-8 conversion error: {}", err))
    }
}
