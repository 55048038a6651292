//! In-memory connector that records every call, for tests.

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use {async_trait::async_trait, clockname_config::AccountConfig, tokio::time::Instant};

use crate::{
    error::SessionError,
    session::{AccountProfile, AccountSession, SessionConnector},
};

/// One `update_profile` call as seen by the fake backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    pub account_id: String,
    pub last_name: String,
    pub at: Instant,
    pub ok: bool,
}

/// Connect/disconnect calls in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected(String),
    Disconnected(String),
}

#[derive(Default)]
struct Shared {
    events: Vec<SessionEvent>,
    unauthorized: HashSet<String>,
    broken_auth_checks: HashSet<String>,
    unreachable: HashSet<String>,
    failing_updates: HashMap<String, usize>,
    failing_disconnects: HashSet<String>,
    connects: HashMap<String, usize>,
    disconnects: HashMap<String, usize>,
    open: HashMap<String, usize>,
    max_open: HashMap<String, usize>,
    updates: Vec<UpdateRecord>,
}

/// Connector whose sessions live in memory. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sessions for `id` will report not authorized.
    pub fn deny_authorization(&self, id: &str) {
        self.lock().unauthorized.insert(id.to_string());
    }

    /// The authorization check for `id` will return an error.
    pub fn fail_authorization_check(&self, id: &str) {
        self.lock().broken_auth_checks.insert(id.to_string());
    }

    /// `connect` for `id` will fail.
    pub fn refuse_connect(&self, id: &str) {
        self.lock().unreachable.insert(id.to_string());
    }

    /// The next `n` updates for `id` will fail.
    pub fn fail_updates(&self, id: &str, n: usize) {
        self.lock().failing_updates.insert(id.to_string(), n);
    }

    /// `disconnect` for `id` will report an error.
    pub fn fail_disconnect(&self, id: &str) {
        self.lock().failing_disconnects.insert(id.to_string());
    }

    pub fn connects(&self, id: &str) -> usize {
        self.lock().connects.get(id).copied().unwrap_or(0)
    }

    pub fn disconnects(&self, id: &str) -> usize {
        self.lock().disconnects.get(id).copied().unwrap_or(0)
    }

    /// Sessions for `id` that are connected and not yet disconnected.
    pub fn open_sessions(&self, id: &str) -> usize {
        self.lock().open.get(id).copied().unwrap_or(0)
    }

    /// Highest number of simultaneously open sessions ever seen for `id`.
    pub fn max_open_sessions(&self, id: &str) -> usize {
        self.lock().max_open.get(id).copied().unwrap_or(0)
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.lock().events.clone()
    }

    pub fn updates(&self) -> Vec<UpdateRecord> {
        self.lock().updates.clone()
    }

    pub fn updates_for(&self, id: &str) -> Vec<UpdateRecord> {
        self.lock()
            .updates
            .iter()
            .filter(|u| u.account_id == id)
            .cloned()
            .collect()
    }

    /// Open a session directly, skipping the `refuse_connect` check.
    pub fn session(&self, id: &str) -> MemorySession {
        let mut shared = self.lock();
        shared.events.push(SessionEvent::Connected(id.to_string()));
        *shared.connects.entry(id.to_string()).or_default() += 1;
        let open = shared.open.entry(id.to_string()).or_default();
        *open += 1;
        let now_open = *open;
        let max = shared.max_open.entry(id.to_string()).or_default();
        *max = (*max).max(now_open);
        MemorySession {
            account_id: id.to_string(),
            connector: self.clone(),
        }
    }
}

#[async_trait]
impl SessionConnector for MemoryConnector {
    async fn connect(
        &self,
        account_id: &str,
        _account: &AccountConfig,
        _session_path: PathBuf,
    ) -> Result<Box<dyn AccountSession>, SessionError> {
        if self.lock().unreachable.contains(account_id) {
            return Err(SessionError::Connect(format!("{account_id} unreachable")));
        }
        Ok(Box::new(self.session(account_id)))
    }
}

pub struct MemorySession {
    account_id: String,
    connector: MemoryConnector,
}

#[async_trait]
impl AccountSession for MemorySession {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    async fn is_authorized(&self) -> Result<bool, SessionError> {
        let shared = self.connector.lock();
        if shared.broken_auth_checks.contains(&self.account_id) {
            return Err(SessionError::Timeout);
        }
        Ok(!shared.unauthorized.contains(&self.account_id))
    }

    async fn update_profile(&self, last_name: &str) -> Result<(), SessionError> {
        let mut shared = self.connector.lock();
        let ok = match shared.failing_updates.get_mut(&self.account_id) {
            Some(left) if *left > 0 => {
                *left -= 1;
                false
            },
            _ => true,
        };
        shared.updates.push(UpdateRecord {
            account_id: self.account_id.clone(),
            last_name: last_name.to_string(),
            at: Instant::now(),
            ok,
        });
        if ok {
            Ok(())
        } else {
            Err(SessionError::Rejected("FLOOD_WAIT".into()))
        }
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        let mut shared = self.connector.lock();
        shared
            .events
            .push(SessionEvent::Disconnected(self.account_id.clone()));
        *shared
            .disconnects
            .entry(self.account_id.clone())
            .or_default() += 1;
        if let Some(open) = shared.open.get_mut(&self.account_id) {
            *open = open.saturating_sub(1);
        }
        if shared.failing_disconnects.contains(&self.account_id) {
            return Err(SessionError::Transport("socket already closed".into()));
        }
        Ok(())
    }

    async fn profile(&self) -> Option<AccountProfile> {
        Some(AccountProfile {
            first_name: Some("Test".into()),
            username: Some(format!("user{}", self.account_id)),
        })
    }
}
