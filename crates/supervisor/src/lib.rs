//! Account lifecycle supervision for the clockname daemon.
//!
//! [`AccountSupervisor`] owns every running account. Config changes reach it
//! through a channel fed by the [`ConfigWatcher`], so all mutations happen on
//! one task and the account map needs no lock. [`ShutdownCoordinator`] tears
//! everything down in a fixed order.

pub mod error;
pub mod marker;
pub mod runtime;
pub mod shutdown;
pub mod supervisor;
pub mod watcher;

pub use {
    error::{MarkerError, StartError},
    marker::LivenessMarker,
    runtime::AccountRuntime,
    shutdown::ShutdownCoordinator,
    supervisor::{AccountSupervisor, ReloadSummary, StartAllReport, SupervisorOptions},
    watcher::{ChangeDetector, ConfigWatcher, PollingChangeDetector, WatcherSettings},
};
