//! On-disk layout of the daemon's data directory.

use std::path::PathBuf;

use directories::ProjectDirs;

/// Where the daemon keeps its files.
///
/// ```text
/// <data_dir>/
///   daemon.pid
///   sessions/
///     config.json
///     <account id>        (session files, owned by the connector)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonPaths {
    pub data_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub config_file: PathBuf,
    pub pid_file: PathBuf,
}

impl DaemonPaths {
    /// Standard layout rooted at `data_dir`.
    pub fn from_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let sessions_dir = data_dir.join("sessions");
        Self {
            config_file: sessions_dir.join("config.json"),
            pid_file: data_dir.join("daemon.pid"),
            sessions_dir,
            data_dir,
        }
    }

    /// Platform data directory, falling back to `./data`.
    pub fn default_data_dir() -> PathBuf {
        ProjectDirs::from("org", "clockname", "clockname")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    /// Create the data and sessions directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.sessions_dir)?;
        if let Some(parent) = self.pid_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
