//! The per-account update loop.

use std::{sync::Arc, time::Duration};

use {
    tokio::{sync::watch, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use clockname_sessions::{AccountSession, SessionError};

use crate::{
    clock::{Clock, delay_to_next_minute},
    format::NameFormat,
};

/// Timing knobs for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    /// Pause after a failed update before waiting for the next boundary.
    pub retry_backoff: Duration,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(10),
        }
    }
}

/// Where a scheduler is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Starting,
    Waiting,
    Executing,
    Retrying,
    Stopped,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Waiting => "waiting",
            Self::Executing => "executing",
            Self::Retrying => "retrying",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Pushes the current time into one account's profile every minute.
///
/// Cancellation is cooperative: it is observed while waiting for the next
/// boundary or during the retry backoff. An update call already in flight
/// runs to completion first.
pub struct PeriodicUpdateScheduler {
    session: Arc<dyn AccountSession>,
    clock: Arc<dyn Clock>,
    format: NameFormat,
    settings: ScheduleSettings,
    cancel: CancellationToken,
    state: watch::Sender<SchedulerState>,
}

impl PeriodicUpdateScheduler {
    pub fn new(
        session: Arc<dyn AccountSession>,
        clock: Arc<dyn Clock>,
        format: NameFormat,
        settings: ScheduleSettings,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Starting);
        Self {
            session,
            clock,
            format,
            settings,
            cancel,
            state,
        }
    }

    /// Observe state transitions. Stays readable after the loop exits.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let session = Arc::clone(&self.session);
        let account_id = session.account_id();
        info!(account_id, "update scheduler started");

        let mut state = SchedulerState::Starting;
        loop {
            self.state.send_replace(state);
            state = match state {
                SchedulerState::Starting => {
                    if self.cancel.is_cancelled() {
                        SchedulerState::Stopped
                    } else {
                        match self.execute().await {
                            Ok(name) => info!(account_id, name = %name, "initial update"),
                            Err(e) => warn!(account_id, error = %e, "initial update failed"),
                        }
                        SchedulerState::Waiting
                    }
                },
                SchedulerState::Waiting => {
                    let delay = delay_to_next_minute(self.clock.now());
                    debug!(account_id, ?delay, "waiting for next minute");
                    if self.pause(delay).await {
                        SchedulerState::Executing
                    } else {
                        SchedulerState::Stopped
                    }
                },
                SchedulerState::Executing => match self.execute().await {
                    Ok(name) => {
                        info!(account_id, name = %name, "updated");
                        SchedulerState::Waiting
                    },
                    Err(e) => {
                        warn!(account_id, error = %e, "update failed");
                        SchedulerState::Retrying
                    },
                },
                SchedulerState::Retrying => {
                    if self.pause(self.settings.retry_backoff).await {
                        SchedulerState::Waiting
                    } else {
                        SchedulerState::Stopped
                    }
                },
                SchedulerState::Stopped => break,
            };
        }

        debug!(account_id, "update scheduler stopped");
    }

    async fn execute(&self) -> Result<String, SessionError> {
        let name = self.format.render(self.clock.now());
        self.session.update_profile(&name).await?;
        Ok(name)
    }

    /// Sleep unless cancelled first. Returns `false` on cancellation.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
