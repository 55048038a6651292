//! Detects rewrites of the account file.

use std::time::{Duration, SystemTime};

use {
    async_trait::async_trait,
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use clockname_config::{Config, ConfigStore};

/// Source of configuration changes.
///
/// Polling is the only implementation today; a filesystem-notification
/// backend can slot in without the supervisor noticing.
#[async_trait]
pub trait ChangeDetector: Send {
    /// The freshly loaded config if the file changed since the last call.
    async fn detect_change(&mut self) -> Option<Config>;
}

/// Compares the file's modification time against the last one seen.
pub struct PollingChangeDetector {
    store: ConfigStore,
    last_seen: Option<SystemTime>,
}

impl PollingChangeDetector {
    /// Starts from the file's current mtime, so the config already loaded
    /// into `store` is not reported again.
    pub fn new(store: ConfigStore) -> Self {
        let last_seen = store.current_mtime();
        Self { store, last_seen }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }
}

#[async_trait]
impl ChangeDetector for PollingChangeDetector {
    async fn detect_change(&mut self) -> Option<Config> {
        let mtime = self.store.current_mtime();
        if mtime == self.last_seen {
            return None;
        }
        info!(
            path = %self.store.path().display(),
            present = mtime.is_some(),
            "config file changed"
        );
        self.last_seen = mtime;
        Some(self.store.load())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherSettings {
    pub poll_interval: Duration,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Polls a [`ChangeDetector`] and forwards new configs to the supervisor.
pub struct ConfigWatcher<D> {
    detector: D,
    settings: WatcherSettings,
    updates: mpsc::Sender<Config>,
    cancel: CancellationToken,
}

impl<D: ChangeDetector + 'static> ConfigWatcher<D> {
    pub fn new(
        detector: D,
        settings: WatcherSettings,
        updates: mpsc::Sender<Config>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            detector,
            settings,
            updates,
            cancel,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        debug!(interval = ?self.settings.poll_interval, "config watcher started");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {},
            }
            let Some(config) = self.detector.detect_change().await else {
                continue;
            };
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                sent = self.updates.send(config) => if sent.is_err() {
                    debug!("supervisor gone, stopping config watcher");
                    break;
                },
            }
        }
        debug!("config watcher stopped");
    }
}
