//! Error types for the PMU monitoring console

use std::fmt;

/// Errors that can occur in the PMU monitoring console
#[derive(Debug, thiserror::Error)]
pub enum PmuMonitorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Local store error: {0}")]
    Store(String),

    #[error("Notifier error: {0}")]
    Notifier(String),

    #[error("Dashboard error: {0}")]
    Dashboard(String),
}

/// Coarse classification of a failure, shown next to stale data in the views
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    ConnectionRefused,
    ClientError,
    ServerError,
    Decode,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::ConnectionRefused => write!(f, "connection refused"),
            ErrorKind::ClientError => write!(f, "client error"),
            ErrorKind::ServerError => write!(f, "server error"),
            ErrorKind::Decode => write!(f, "bad response"),
            ErrorKind::Other => write!(f, "error"),
        }
    }
}

impl PmuMonitorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PmuMonitorError::Timeout(_) => ErrorKind::Timeout,
            PmuMonitorError::ConnectionRefused(_) => ErrorKind::ConnectionRefused,
            PmuMonitorError::Status { status, .. } if (400..500).contains(status) => {
                ErrorKind::ClientError
            }
            PmuMonitorError::Status { .. } => ErrorKind::ServerError,
            PmuMonitorError::Json(_) => ErrorKind::Decode,
            _ => ErrorKind::Other,
        }
    }

    /// Whether retrying the same request later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Timeout | ErrorKind::ConnectionRefused | ErrorKind::ServerError
        )
    }
}

/// Result type alias for console operations
pub type Result<T> = std::result::Result<T, PmuMonitorError>;
