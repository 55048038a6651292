//! Ordered teardown of the whole daemon.

use {
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::{marker::LivenessMarker, supervisor::AccountSupervisor};

/// Runs the shutdown sequence exactly once.
///
/// Order: root token cancelled, watcher joined, every scheduler joined,
/// every session released, liveness marker removed.
pub struct ShutdownCoordinator {
    cancel: CancellationToken,
    watcher: Option<(CancellationToken, JoinHandle<()>)>,
    marker: Option<LivenessMarker>,
    completed: bool,
}

impl ShutdownCoordinator {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            watcher: None,
            marker: None,
            completed: false,
        }
    }

    /// The root token. Signal handlers cancel this.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn set_watcher(&mut self, cancel: CancellationToken, handle: JoinHandle<()>) {
        self.watcher = Some((cancel, handle));
    }

    pub fn set_marker(&mut self, marker: LivenessMarker) {
        self.marker = Some(marker);
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub async fn shutdown(&mut self, supervisor: &mut AccountSupervisor) {
        if self.completed {
            return;
        }
        self.completed = true;
        info!("shutting down");

        self.cancel.cancel();

        if let Some((cancel, handle)) = self.watcher.take() {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "config watcher ended abnormally");
            }
        }

        supervisor.shutdown().await;

        if let Some(mut marker) = self.marker.take() {
            marker.remove();
        }
        info!("shutdown complete");
    }
}
