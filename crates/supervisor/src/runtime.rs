//! One running account: its session plus its scheduler task.

use std::sync::Arc;

use {
    tokio::{sync::watch, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use {
    clockname_scheduler::{PeriodicUpdateScheduler, SchedulerState},
    clockname_sessions::AccountSession,
};

/// Session and scheduler task of an active account.
///
/// Both halves exist together for the runtime's whole life. The scheduler
/// only borrows the session for update calls; the runtime releases it after
/// the task has finished.
pub struct AccountRuntime {
    account_id: String,
    session: Arc<dyn AccountSession>,
    task: JoinHandle<()>,
    cancel: CancellationToken,
    state: watch::Receiver<SchedulerState>,
}

impl AccountRuntime {
    /// Spawn `scheduler` and take ownership of `session`.
    pub fn launch(
        session: Arc<dyn AccountSession>,
        scheduler: PeriodicUpdateScheduler,
        cancel: CancellationToken,
    ) -> Self {
        let state = scheduler.subscribe();
        Self {
            account_id: session.account_id().to_string(),
            session,
            task: scheduler.spawn(),
            cancel,
            state,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Ask the scheduler to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the scheduler, wait for it, and release the session.
    pub async fn stop(self) {
        let session = self.halt().await;
        release_session(session.as_ref()).await;
    }

    /// Stop the scheduler and wait for it. Hands back the session, which the
    /// caller must release.
    pub async fn halt(self) -> Arc<dyn AccountSession> {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(account_id = %self.account_id, error = %e, "update scheduler ended abnormally");
        }
        self.session
    }
}

/// Disconnect a session, logging instead of failing.
pub async fn release_session(session: &dyn AccountSession) {
    let account_id = session.account_id();
    match session.disconnect().await {
        Ok(()) => info!(account_id, "disconnected"),
        Err(e) => warn!(account_id, error = %e, "failed to disconnect"),
    }
}
