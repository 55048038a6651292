//! Per-account minute-aligned update loop.
//!
//! Each active account runs one [`PeriodicUpdateScheduler`]. It pushes the
//! current `HH:MM` into the account's profile once right away and then on
//! every minute boundary until its cancellation token fires.

pub mod clock;
pub mod format;
pub mod scheduler;

pub use {
    clock::{Clock, SystemClock, delay_to_next_minute},
    format::NameFormat,
    scheduler::{PeriodicUpdateScheduler, ScheduleSettings, SchedulerState},
};

#[cfg(any(test, feature = "testing"))]
pub use clock::ManualClock;
