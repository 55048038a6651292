//! File-backed account configuration.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::SystemTime,
};

use tracing::{debug, warn};

use crate::{account::Config, error::ConfigError};

/// Read and parse the account file.
///
/// A missing file is the empty configuration, not an error.
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        },
    };
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Holds the last good configuration read from the account file.
pub struct ConfigStore {
    path: PathBuf,
    current: Config,
}

impl ConfigStore {
    /// Create a store without reading the file yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: Config::default(),
        }
    }

    /// Create a store and load the file once.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(path);
        store.load();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The last successfully loaded configuration.
    pub fn current(&self) -> &Config {
        &self.current
    }

    /// Re-read the file.
    ///
    /// Read or parse failures are logged and the previous value is kept, so a
    /// half-written file never tears down running accounts.
    pub fn load(&mut self) -> Config {
        match read_config(&self.path) {
            Ok(config) => {
                debug!(path = %self.path.display(), accounts = config.len(), "loaded config");
                self.current = config;
            },
            Err(e) => {
                warn!(error = %e, "failed to load config, keeping previous");
            },
        }
        self.current.clone()
    }

    /// Modification time of the backing file, `None` if it does not exist.
    pub fn current_mtime(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::new(dir.path().join("config.json"));
        assert!(store.load().is_empty());
        assert!(store.current_mtime().is_none());
    }

    #[test]
    fn loads_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write(&path, r#"{"accounts": {"1555": {"api_id": 1, "api_hash": "h"}}}"#);

        let store = ConfigStore::open(&path);
        assert_eq!(store.current().ids().len(), 1);
        assert!(store.current().get("1555").is_some());
        assert!(store.current_mtime().is_some());
    }

    #[test]
    fn corrupt_file_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write(&path, r#"{"accounts": {"1555": {"api_id": 1, "api_hash": "h"}}}"#);
        let mut store = ConfigStore::open(&path);

        write(&path, r#"{"accounts": {"1555": "#);
        let config = store.load();
        assert!(config.get("1555").is_some());
        assert!(matches!(read_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn corrupt_file_at_startup_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write(&path, "not json");
        let store = ConfigStore::open(&path);
        assert!(store.current().is_empty());
    }

    #[test]
    fn removed_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write(&path, r#"{"accounts": {"1555": {"api_id": 1, "api_hash": "h"}}}"#);
        let mut store = ConfigStore::open(&path);

        fs::remove_file(&path).unwrap();
        assert!(store.load().is_empty());
        assert!(store.current_mtime().is_none());
    }

    #[test]
    fn directory_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_config(dir.path()),
            Err(ConfigError::Io { .. })
        ));
    }
}
