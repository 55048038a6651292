use thiserror::Error;

/// Failures reported by a session or connector.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("request timed out")]
    Timeout,

    #[error("session closed")]
    Closed,
}
