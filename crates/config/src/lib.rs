//! Account-set configuration for the clockname daemon.
//!
//! The account file is a single JSON document written by the external
//! management tool. The daemon only reads it: [`ConfigStore`] loads it and
//! reports its modification time so the watcher can notice rewrites.

pub mod account;
pub mod error;
pub mod paths;
pub mod store;

pub use {
    account::{AccountConfig, Config},
    error::ConfigError,
    paths::DaemonPaths,
    store::{ConfigStore, read_config},
};
