use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

use {
    async_trait::async_trait,
    chrono::NaiveDate,
    clockname_config::{AccountConfig, ConfigStore},
    clockname_scheduler::{ManualClock, SchedulerState},
    clockname_sessions::{
        AccountSession, SessionConnector, SessionError, memory::MemoryConnector,
    },
    clockname_supervisor::{
        AccountSupervisor, ConfigWatcher, LivenessMarker, PollingChangeDetector,
        ShutdownCoordinator, SupervisorOptions, WatcherSettings,
    },
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
};

fn options(dir: &Path) -> SupervisorOptions {
    let start = NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(8, 0, 20)
        .unwrap();
    SupervisorOptions::new(dir.join("sessions"))
        .with_clock(Arc::new(ManualClock::starting_at(start)))
}

fn write_with_mtime(path: &Path, body: &str, offset: u64) {
    fs::write(path, body).unwrap();
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(offset))
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn emptied_config_stops_running_account() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    write_with_mtime(
        &config_path,
        r#"{"accounts": {"1555": {"api_id": 12345, "api_hash": "abc"}}}"#,
        0,
    );

    let connector = MemoryConnector::new();
    let root = CancellationToken::new();
    let mut supervisor =
        AccountSupervisor::new(Arc::new(connector.clone()), options(dir.path()), root.clone());

    let store = ConfigStore::open(&config_path);
    supervisor.start_all(store.current()).await;
    assert!(supervisor.is_active("1555"));

    let (tx, mut rx) = mpsc::channel(4);
    let watcher_cancel = root.child_token();
    let watcher = ConfigWatcher::new(
        PollingChangeDetector::new(store),
        WatcherSettings::default(),
        tx,
        watcher_cancel.clone(),
    )
    .spawn();

    write_with_mtime(&config_path, r#"{"accounts": {}}"#, 30);

    let stopper = {
        let root = root.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(6)).await;
            root.cancel();
        }
    };
    tokio::join!(supervisor.serve(&mut rx, &root), stopper);

    assert!(supervisor.is_empty());
    assert_eq!(connector.disconnects("1555"), 1);
    assert_eq!(connector.updates_for("1555").len(), 1);

    watcher.await.unwrap();
}

/// Wraps the memory connector and records whether the liveness marker still
/// existed when each session was released.
struct MarkerProbe {
    inner: MemoryConnector,
    marker: PathBuf,
    seen: Arc<Mutex<Vec<(String, bool)>>>,
}

struct ProbedSession {
    inner: Box<dyn AccountSession>,
    marker: PathBuf,
    seen: Arc<Mutex<Vec<(String, bool)>>>,
}

#[async_trait]
impl SessionConnector for MarkerProbe {
    async fn connect(
        &self,
        account_id: &str,
        account: &AccountConfig,
        session_path: PathBuf,
    ) -> Result<Box<dyn AccountSession>, SessionError> {
        let inner = self.inner.connect(account_id, account, session_path).await?;
        Ok(Box::new(ProbedSession {
            inner,
            marker: self.marker.clone(),
            seen: Arc::clone(&self.seen),
        }))
    }
}

#[async_trait]
impl AccountSession for ProbedSession {
    fn account_id(&self) -> &str {
        self.inner.account_id()
    }

    async fn is_authorized(&self) -> Result<bool, SessionError> {
        self.inner.is_authorized().await
    }

    async fn update_profile(&self, last_name: &str) -> Result<(), SessionError> {
        self.inner.update_profile(last_name).await
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        self.seen
            .lock()
            .unwrap()
            .push((self.account_id().to_string(), self.marker.exists()));
        self.inner.disconnect().await
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_mid_backoff_releases_before_marker_removal() {
    let dir = tempfile::tempdir().unwrap();
    let marker_path = dir.path().join("daemon.pid");
    let memory = MemoryConnector::new();
    memory.fail_updates("a", 2);
    memory.fail_updates("b", 2);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let probe = MarkerProbe {
        inner: memory.clone(),
        marker: marker_path.clone(),
        seen: Arc::clone(&seen),
    };

    let root = CancellationToken::new();
    let mut coordinator = ShutdownCoordinator::new(root.clone());
    coordinator.set_marker(LivenessMarker::create(&marker_path).unwrap());
    let mut supervisor = AccountSupervisor::new(Arc::new(probe), options(dir.path()), root);

    let config = clockname_config::Config::default()
        .with_account("a", AccountConfig::new(1, "x"))
        .with_account("b", AccountConfig::new(2, "y"));
    supervisor.start_all(&config).await;

    // The initial updates fail and go straight to waiting. The minute
    // boundary is 40s away; those updates fail too and enter the backoff.
    tokio::time::sleep(Duration::from_secs(42)).await;
    for id in ["a", "b"] {
        assert_eq!(supervisor.scheduler_state(id), Some(SchedulerState::Retrying));
    }

    let before = tokio::time::Instant::now();
    coordinator.shutdown(&mut supervisor).await;
    assert!(before.elapsed() < Duration::from_secs(1));

    assert!(supervisor.is_empty());
    assert!(!marker_path.exists());
    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|(_, marker_present)| *marker_present));

    coordinator.shutdown(&mut supervisor).await;
    assert_eq!(memory.disconnects("a"), 1);
    assert_eq!(memory.disconnects("b"), 1);
}
