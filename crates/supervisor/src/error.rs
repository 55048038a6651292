use std::path::PathBuf;

use {clockname_sessions::SessionError, thiserror::Error};

/// Why an account was not started. None of these stop the daemon.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("account {0} is already running")]
    AlreadyActive(String),

    #[error("account {0} is not authorized")]
    NotAuthorized(String),

    #[error("failed to connect account {account_id}: {source}")]
    Connect {
        account_id: String,
        #[source]
        source: SessionError,
    },

    #[error("authorization check for {account_id} failed: {source}")]
    Authorization {
        account_id: String,
        #[source]
        source: SessionError,
    },

    #[error("supervisor is shutting down")]
    ShuttingDown,
}

#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("failed to write liveness marker {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
