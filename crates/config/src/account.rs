//! Account file schema.

use std::collections::{BTreeMap, BTreeSet};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Connection parameters for a single account.
///
/// The account id (usually the phone number) is the key of the
/// `accounts` map, so it is not repeated here.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Telegram application id.
    pub api_id: i32,

    /// Telegram application hash.
    #[serde(serialize_with = "serialize_secret")]
    pub api_hash: Secret<String>,
}

impl AccountConfig {
    pub fn new(api_id: i32, api_hash: impl Into<String>) -> Self {
        Self {
            api_id,
            api_hash: Secret::new(api_hash.into()),
        }
    }
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("api_id", &self.api_id)
            .field("api_hash", &"[REDACTED]")
            .finish()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// The whole account set, keyed by account id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

impl Config {
    /// Account ids in this configuration.
    pub fn ids(&self) -> BTreeSet<String> {
        self.accounts.keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&AccountConfig> {
        self.accounts.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Builder used mostly by tests and embedders.
    pub fn with_account(mut self, id: impl Into<String>, account: AccountConfig) -> Self {
        self.accounts.insert(id.into(), account);
        self
    }
}
