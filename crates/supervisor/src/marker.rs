//! PID file advertising that the daemon is alive.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::error::MarkerError;

/// PID file written at startup and removed on clean shutdown.
///
/// Only external probes read it. Nothing inside the daemon depends on it.
#[derive(Debug)]
pub struct LivenessMarker {
    path: PathBuf,
    present: bool,
}

impl LivenessMarker {
    /// Write the current process id to `path`, replacing any stale marker.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, MarkerError> {
        Self::create_with_pid(path, std::process::id())
    }

    pub fn create_with_pid(path: impl Into<PathBuf>, pid: u32) -> Result<Self, MarkerError> {
        let path = path.into();
        fs::write(&path, pid.to_string()).map_err(|source| MarkerError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), pid, "wrote liveness marker");
        Ok(Self {
            path,
            present: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Delete the marker. Safe to call more than once.
    pub fn remove(&mut self) {
        if !self.present {
            return;
        }
        self.present = false;
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed liveness marker"),
            Err(e) if e.kind() == ErrorKind::NotFound => {},
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove liveness marker"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_pid_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");

        let mut marker = LivenessMarker::create(&path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            std::process::id().to_string()
        );

        marker.remove();
        assert!(!path.exists());
        assert!(!marker.is_present());
        marker.remove();
    }

    #[test]
    fn overwrites_stale_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        fs::write(&path, "99999").unwrap();

        LivenessMarker::create_with_pid(&path, 42).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "42");
    }

    #[test]
    fn unwritable_location_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("daemon.pid");
        assert!(matches!(
            LivenessMarker::create(&path),
            Err(MarkerError::Write { .. })
        ));
    }

    #[test]
    fn removing_externally_deleted_marker_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        let mut marker = LivenessMarker::create(&path).unwrap();
        fs::remove_file(&path).unwrap();
        marker.remove();
        assert!(!marker.is_present());
    }
}
