//! Single-instance guard backed by a PID file.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::DaemonError;

/// Holds the PID file for as long as it lives.
///
/// Dropping it removes the file, unless another process has since written
/// its own id there.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    pid: u32,
}

impl PidFile {
    /// Claim `path` for this process.
    ///
    /// Fails with [`DaemonError::AlreadyRunning`] when the file names a live
    /// process. A file naming a dead process, or holding garbage, is stale
    /// and replaced.
    pub fn acquire(path: &Path) -> Result<Self, DaemonError> {
        let io_err = |source: io::Error| DaemonError::PidFile {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let pid = std::process::id();
        // Second pass only happens when another process won a race for the file
        for _ in 0..2 {
            match read_pid(path).map_err(io_err)? {
                Some(existing) if process_alive(existing) => {
                    return Err(DaemonError::AlreadyRunning(existing));
                }
                Some(existing) => {
                    info!("Removing stale PID file {} (pid {})", path.display(), existing);
                    remove_if_exists(path).map_err(io_err)?;
                }
                None if path.exists() => {
                    warn!("Removing unreadable PID file {}", path.display());
                    remove_if_exists(path).map_err(io_err)?;
                }
                None => {}
            }

            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    writeln!(file, "{}", pid).map_err(io_err)?;
                    debug!("Wrote PID {} to {}", pid, path.display());
                    return Ok(Self {
                        path: path.to_path_buf(),
                        pid,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(io_err(e)),
            }
        }

        match read_pid(path).map_err(io_err)? {
            Some(existing) => Err(DaemonError::AlreadyRunning(existing)),
            None => Err(io_err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "PID file keeps reappearing",
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match read_pid(&self.path) {
            Ok(Some(pid)) if pid == self.pid as i32 => {
                if let Err(e) = fs::remove_file(&self.path) {
                    warn!("Failed to remove PID file {}: {}", self.path.display(), e);
                }
            }
            _ => debug!("PID file {} no longer ours", self.path.display()),
        }
    }
}

/// PID recorded in `path`. `None` when missing or not a positive number.
pub fn read_pid(path: &Path) -> io::Result<Option<i32>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text.trim().parse::<i32>().ok().filter(|pid| *pid > 0)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Whether a process with this id exists.
#[cfg(unix)]
pub fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // Signal 0 only checks for existence and permission
    let result = unsafe { libc::kill(pid, 0) };
    result == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn process_alive(pid: i32) -> bool {
    pid > 0 && pid as u32 == std::process::id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run").join("jobflow.pid");

        let guard = PidFile::acquire(&path).unwrap();
        assert_eq!(
            read_pid(&path).unwrap(),
            Some(std::process::id() as i32)
        );
        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn test_garbage_marker_is_stale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobflow.pid");
        fs::write(&path, "not a pid\n").unwrap();

        let _guard = PidFile::acquire(&path).unwrap();
        assert_eq!(
            read_pid(&path).unwrap(),
            Some(std::process::id() as i32)
        );
    }

    #[test]
    fn test_drop_leaves_foreign_marker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobflow.pid");

        let guard = PidFile::acquire(&path).unwrap();
        fs::write(&path, "999999999\n").unwrap();
        drop(guard);
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_process_alive() {
        assert!(process_alive(std::process::id() as i32));
        assert!(!process_alive(999_999_999));
        assert!(!process_alive(0));
        assert!(!process_alive(-1));
    }
}
