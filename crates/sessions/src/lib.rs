//! The contract between the supervisor and the remote account service.
//!
//! The daemon never speaks the remote protocol itself. It only needs four
//! things from a session: open it, ask whether it is authorized, push a new
//! profile name, and close it again.

pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod session;

pub use {
    error::SessionError,
    session::{AccountProfile, AccountSession, SessionConnector},
};
