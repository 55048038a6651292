use std::path::PathBuf;

use {async_trait::async_trait, clockname_config::AccountConfig};

use crate::error::SessionError;

/// Who the session is logged in as. Only used for log lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountProfile {
    pub first_name: Option<String>,
    pub username: Option<String>,
}

impl std::fmt::Display for AccountProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (@{})",
            self.first_name.as_deref().unwrap_or("unknown"),
            self.username.as_deref().unwrap_or("unknown")
        )
    }
}

/// Opens sessions for accounts.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Open a session for `account_id`, persisting its state at `session_path`.
    async fn connect(
        &self,
        account_id: &str,
        account: &AccountConfig,
        session_path: PathBuf,
    ) -> Result<Box<dyn AccountSession>, SessionError>;
}

/// A live session for one account.
#[async_trait]
pub trait AccountSession: Send + Sync {
    fn account_id(&self) -> &str;

    /// Whether the stored session is logged in.
    async fn is_authorized(&self) -> Result<bool, SessionError>;

    /// Replace the account's profile last name.
    async fn update_profile(&self, last_name: &str) -> Result<(), SessionError>;

    async fn disconnect(&self) -> Result<(), SessionError>;

    /// Logged-in user, when the backend can tell.
    async fn profile(&self) -> Option<AccountProfile> {
        None
    }
}
