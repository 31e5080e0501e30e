//! Singleton guard: a pid file marking the running instance.
//!
//! The marker is advisory, not a lock. A stale marker left by a dead
//! instance is cleaned up at startup; a marker held by a live process is
//! reported and replaced anyway, so two instances *can* run against the
//! same path. What the marker buys is crash recovery and visibility, not
//! mutual exclusion.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum PidFileError {
    #[error("pid file {path} holds garbage: {contents:?}")]
    Malformed { path: PathBuf, contents: String },
    #[error("couldn't create pid file: {0}")]
    Create(#[source] std::io::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Reconcile any marker left by a previous instance, then install a
    /// fresh one holding the current pid.
    ///
    /// Installation writes the pid to a sibling temp file and hard-links
    /// it into place, so the marker never holds a partial write. A
    /// failing link (the marker reappeared concurrently) is fatal.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, PidFileError> {
        let path = path.into();
        remove_previous(&path)?;

        let pid = std::process::id();
        let tmp = PathBuf::from(format!("{}.{}", path.display(), pid));
        std::fs::write(&tmp, format!("{pid}\n")).map_err(PidFileError::Create)?;
        let linked = std::fs::hard_link(&tmp, &path);
        let _ = std::fs::remove_file(&tmp);
        linked.map_err(PidFileError::Create)?;

        info!("Created pid file {} (pid {})", path.display(), pid);
        Ok(Self { path })
    }

    /// Remove the marker, ignoring "already gone".
    pub fn close(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove pid file {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Deal with a marker left behind by a previous instance. Dead owner:
/// the marker is stale, remove it silently. Live owner: report the
/// conflict but proceed; the marker is replaced, not honored.
fn remove_previous(path: &Path) -> Result<(), PidFileError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let pid: i32 = contents.trim().parse().map_err(|_| PidFileError::Malformed {
        path: path.to_path_buf(),
        contents,
    })?;

    if pid_is_alive(pid) {
        error!("Found fresh pid file {} (pid {} is running)", path.display(), pid);
    } else {
        info!("Found stale pid file {}, removing it", path.display());
    }
    std::fs::remove_file(path)?;
    Ok(())
}

/// Signal 0 probes for existence without delivering anything. EPERM
/// means the process exists but belongs to someone else, so still alive.
fn pid_is_alive(pid: i32) -> bool {
    matches!(kill(Pid::from_raw(pid), None), Ok(()) | Err(Errno::EPERM))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A pid that is guaranteed dead: spawn a short-lived child and reap it.
    fn dead_pid() -> u32 {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        pid
    }

    #[test]
    fn test_create_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.pid");

        let pidfile = PidFile::create(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());

        pidfile.close();
        assert!(!path.exists());
    }

    #[test]
    fn test_stale_marker_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.pid");
        std::fs::write(&path, format!("{}\n", dead_pid())).unwrap();

        let pidfile = PidFile::create(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
        pidfile.close();
    }

    #[test]
    fn test_live_marker_still_permits_install() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.pid");
        // Our own pid is certainly alive.
        std::fs::write(&path, format!("{}\n", std::process::id())).unwrap();

        let pidfile = PidFile::create(&path).unwrap();
        assert!(path.exists());
        pidfile.close();
    }

    #[test]
    fn test_malformed_marker_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.pid");
        std::fs::write(&path, "not a pid\n").unwrap();

        assert!(matches!(
            PidFile::create(&path),
            Err(PidFileError::Malformed { .. })
        ));
    }

    #[test]
    fn test_temp_file_is_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.pid");

        let pidfile = PidFile::create(&path).unwrap();
        let tmp = format!("{}.{}", path.display(), std::process::id());
        assert!(!Path::new(&tmp).exists());
        pidfile.close();
    }

    #[test]
    fn test_close_tolerates_missing_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.pid");
        let pidfile = PidFile::create(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        pidfile.close();
    }

    #[test]
    fn test_pid_is_alive() {
        assert!(pid_is_alive(std::process::id() as i32));
        assert!(!pid_is_alive(dead_pid() as i32));
    }
}
