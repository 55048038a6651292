//! The authoritative map of running accounts.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    sync::Arc,
};

use {
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, instrument, warn},
};

use {
    clockname_config::{AccountConfig, Config},
    clockname_scheduler::{
        Clock, NameFormat, PeriodicUpdateScheduler, ScheduleSettings, SchedulerState, SystemClock,
    },
    clockname_sessions::{AccountSession, SessionConnector},
};

use crate::{
    error::StartError,
    runtime::{AccountRuntime, release_session},
};

/// How new schedulers are built.
#[derive(Clone)]
pub struct SupervisorOptions {
    /// Directory holding one session file per account id.
    pub sessions_dir: PathBuf,
    pub clock: Arc<dyn Clock>,
    pub format: NameFormat,
    pub schedule: ScheduleSettings,
}

impl SupervisorOptions {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
            clock: Arc::new(SystemClock::local()),
            format: NameFormat::default(),
            schedule: ScheduleSettings::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_format(mut self, format: NameFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleSettings) -> Self {
        self.schedule = schedule;
        self
    }
}

/// Result of [`AccountSupervisor::start_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartAllReport {
    pub attempted: usize,
    pub succeeded: usize,
}

/// What a reload changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub removed: Vec<String>,
    pub added: Vec<String>,
    /// Subset of `added` that actually started.
    pub started: Vec<String>,
}

impl ReloadSummary {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Starts, stops and reconciles accounts.
///
/// Every mutation goes through `&mut self`, so the map is only ever touched
/// by the task that owns the supervisor.
pub struct AccountSupervisor {
    connector: Arc<dyn SessionConnector>,
    options: SupervisorOptions,
    cancel: CancellationToken,
    runtimes: BTreeMap<String, AccountRuntime>,
}

impl AccountSupervisor {
    /// `cancel` is the process-wide token; each account gets a child of it.
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        options: SupervisorOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connector,
            options,
            cancel,
            runtimes: BTreeMap::new(),
        }
    }

    pub fn active_ids(&self) -> BTreeSet<String> {
        self.runtimes.keys().cloned().collect()
    }

    pub fn is_active(&self, account_id: &str) -> bool {
        self.runtimes.contains_key(account_id)
    }

    pub fn scheduler_state(&self, account_id: &str) -> Option<SchedulerState> {
        self.runtimes
            .get(account_id)
            .map(AccountRuntime::scheduler_state)
    }

    pub fn len(&self) -> usize {
        self.runtimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }

    /// Connect an account and start its scheduler.
    ///
    /// Unauthorized sessions are disconnected again and nothing is recorded.
    #[instrument(skip_all, fields(account_id = %account_id))]
    pub async fn start(
        &mut self,
        account_id: &str,
        account: &AccountConfig,
    ) -> Result<(), StartError> {
        if self.cancel.is_cancelled() {
            return Err(StartError::ShuttingDown);
        }
        if self.runtimes.contains_key(account_id) {
            return Err(StartError::AlreadyActive(account_id.to_string()));
        }

        let session_path = self.options.sessions_dir.join(account_id);
        let session: Arc<dyn AccountSession> = self
            .connector
            .connect(account_id, account, session_path)
            .await
            .map_err(|source| StartError::Connect {
                account_id: account_id.to_string(),
                source,
            })?
            .into();

        match session.is_authorized().await {
            Ok(true) => {},
            Ok(false) => {
                warn!("account not authorized, skipping");
                release_session(session.as_ref()).await;
                return Err(StartError::NotAuthorized(account_id.to_string()));
            },
            Err(source) => {
                release_session(session.as_ref()).await;
                return Err(StartError::Authorization {
                    account_id: account_id.to_string(),
                    source,
                });
            },
        }

        if let Some(profile) = session.profile().await {
            info!(%profile, "loaded account");
        }

        let cancel = self.cancel.child_token();
        let scheduler = PeriodicUpdateScheduler::new(
            Arc::clone(&session),
            Arc::clone(&self.options.clock),
            self.options.format.clone(),
            self.options.schedule,
            cancel.clone(),
        );
        self.runtimes.insert(
            account_id.to_string(),
            AccountRuntime::launch(session, scheduler, cancel),
        );
        info!("account started");
        Ok(())
    }

    /// Stop an account and release its session. Unknown ids are ignored.
    #[instrument(skip_all, fields(account_id = %account_id))]
    pub async fn stop(&mut self, account_id: &str) {
        let Some(runtime) = self.runtimes.remove(account_id) else {
            debug!("account not running");
            return;
        };
        runtime.stop().await;
        info!("account stopped");
    }

    /// Start every account in `config`. Failures are logged and skipped.
    pub async fn start_all(&mut self, config: &Config) -> StartAllReport {
        let mut report = StartAllReport::default();
        if config.is_empty() {
            info!("no accounts configured");
            return report;
        }

        info!(count = config.len(), "loading accounts");
        for (account_id, account) in &config.accounts {
            report.attempted += 1;
            match self.start(account_id, account).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => warn!(account_id = %account_id, error = %e, "failed to start account"),
            }
        }
        info!(
            succeeded = report.succeeded,
            attempted = report.attempted,
            "started {}/{} accounts",
            report.succeeded,
            report.attempted
        );
        report
    }

    /// Reconcile running accounts with `config`.
    ///
    /// Removed ids are stopped before any added id is started. Ids present on
    /// both sides are left alone, even if their credentials changed.
    pub async fn reload(&mut self, config: &Config) -> ReloadSummary {
        let current = self.active_ids();
        let desired = config.ids();

        let mut summary = ReloadSummary {
            removed: current.difference(&desired).cloned().collect(),
            added: desired.difference(&current).cloned().collect(),
            started: Vec::new(),
        };
        if summary.is_noop() {
            debug!("reload: nothing to do");
            return summary;
        }
        info!(
            removed = summary.removed.len(),
            added = summary.added.len(),
            "reloading accounts"
        );

        for account_id in &summary.removed {
            info!(account_id = %account_id, "account removed from config");
            self.stop(account_id).await;
        }

        for account_id in &summary.added {
            let Some(account) = config.get(account_id) else {
                continue;
            };
            info!(account_id = %account_id, "account added to config");
            match self.start(account_id, account).await {
                Ok(()) => summary.started.push(account_id.clone()),
                Err(e) => warn!(account_id = %account_id, error = %e, "failed to start account"),
            }
        }

        info!(active = self.runtimes.len(), "reload complete");
        summary
    }

    /// Apply configs from the watcher until `cancel` fires.
    pub async fn serve(&mut self, updates: &mut mpsc::Receiver<Config>, cancel: &CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = updates.recv() => match next {
                    Some(config) => {
                        self.reload(&config).await;
                    },
                    None => {
                        debug!("config updates closed");
                        cancel.cancelled().await;
                        break;
                    },
                },
            }
        }
    }

    /// Cancel every scheduler, wait for all of them, then release every
    /// session and forget all accounts. A second call does nothing.
    pub async fn shutdown(&mut self) {
        if self.runtimes.is_empty() {
            return;
        }
        let runtimes = std::mem::take(&mut self.runtimes);
        info!(count = runtimes.len(), "stopping all accounts");

        for runtime in runtimes.values() {
            runtime.cancel();
        }
        let sessions = futures::future::join_all(runtimes.into_values().map(AccountRuntime::halt)).await;

        for session in sessions {
            release_session(session.as_ref()).await;
        }
    }
}
