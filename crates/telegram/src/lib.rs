//! Telegram sessions backed by an MTProto sidecar process.
//!
//! The sidecar owns the actual Telegram client and the session files. This
//! crate speaks JSON to it over one WebSocket per account and exposes the
//! result through the [`clockname_sessions`] traits.

pub mod connector;
pub mod sidecar;
pub mod types;

pub use {
    connector::{TelegramConnector, TelegramSession},
    sidecar::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_SIDECAR_URL, SidecarLink},
    types::{GatewayMessage, ProfileInfo, SidecarMessage, SidecarReply},
};
