use std::{path::PathBuf, time::Duration};

use {
    anyhow::{Result, anyhow},
    chrono_tz::Tz,
    clap::Parser,
};

use {clockname_config::DaemonPaths, clockname_telegram::DEFAULT_SIDECAR_URL};

/// Keeps the last name of every configured Telegram account set to the
/// current time, updated each minute.
#[derive(Debug, Parser)]
#[command(name = "clockname", version, about)]
pub struct Args {
    /// Root of the daemon's files.
    #[arg(long, env = "CLOCKNAME_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Account file. Defaults to `<data-dir>/sessions/config.json`.
    #[arg(long, env = "CLOCKNAME_CONFIG")]
    pub config: Option<PathBuf>,

    /// Session file directory. Defaults to `<data-dir>/sessions`.
    #[arg(long)]
    pub sessions_dir: Option<PathBuf>,

    /// Liveness marker. Defaults to `<data-dir>/daemon.pid`.
    #[arg(long)]
    pub pid_file: Option<PathBuf>,

    /// IANA time zone for the displayed time. Host local time if unset.
    #[arg(long, env = "CLOCKNAME_TIMEZONE")]
    pub timezone: Option<String>,

    /// Label appended after the time.
    #[arg(long, default_value = clockname_scheduler::format::DEFAULT_ZONE_SUFFIX)]
    pub zone_suffix: String,

    /// WebSocket address of the MTProto sidecar.
    #[arg(long, env = "CLOCKNAME_SIDECAR_URL", default_value = DEFAULT_SIDECAR_URL)]
    pub sidecar_url: String,

    /// Seconds to wait for each sidecar reply.
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    /// File layout after applying per-path overrides.
    pub fn paths(&self) -> DaemonPaths {
        let data_dir = self
            .data_dir
            .clone()
            .unwrap_or_else(DaemonPaths::default_data_dir);
        let mut paths = DaemonPaths::from_data_dir(data_dir);
        if let Some(dir) = &self.sessions_dir {
            paths.sessions_dir = dir.clone();
            paths.config_file = dir.join("config.json");
        }
        if let Some(config) = &self.config {
            paths.config_file = config.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            paths.pid_file = pid_file.clone();
        }
        paths
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn time_zone(&self) -> Result<Option<Tz>> {
        self.timezone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|e| anyhow!("invalid time zone {name:?}: {e}"))
            })
            .transpose()
    }
}
