//! PID-file lifecycle backing the `status`/`stop` CLI subcommands and the
//! "is an instance already running" check performed before `mount`.

use std::path::{Path, PathBuf};

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PidFile { path: path.into() }
    }

    /// Write the current process PID, creating parent directories as needed.
    pub fn write_current(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, std::process::id().to_string())?;
        Ok(())
    }

    pub fn remove(&self) {
        let _ = std::fs::remove_file(&self.path);
    }

    fn read_pid(&self) -> Option<i32> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok())
    }

    /// True if the PID file exists and names a live process.
    pub fn is_running(&self) -> bool {
        match self.read_pid() {
            Some(pid) => process_alive(pid),
            None => false,
        }
    }

    /// Send SIGTERM to the recorded PID. No-op if no PID file is present.
    pub fn send_stop_signal(&self) -> anyhow::Result<bool> {
        match self.read_pid() {
            Some(pid) => {
                let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
                if rc != 0 {
                    anyhow::bail!(
                        "failed to signal pid {pid}: {}",
                        std::io::Error::last_os_error()
                    );
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    // kill(pid, 0) performs no signal delivery, only existence/permission checks.
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    false
}

/// Returns true if `mount_point` currently appears in `/proc/mounts`.
///
/// Used by `status` (to corroborate the PID-file check) and by `fix` (to
/// detect a stale mount left behind by a crashed process).
pub fn is_mounted(mount_point: &Path) -> bool {
    let target = match mount_point.canonicalize() {
        Ok(p) => p,
        Err(_) => mount_point.to_path_buf(),
    };
    let Ok(contents) = std::fs::read_to_string("/proc/mounts") else {
        return false;
    };
    contents
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(target.to_string_lossy().as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("sharebox.pid");
        let pf = PidFile::new(&pid_path);
        pf.write_current().unwrap();
        assert!(pid_path.exists());
        assert!(pf.is_running());
    }

    #[test]
    fn missing_file_is_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let pf = PidFile::new(dir.path().join("nope.pid"));
        assert!(!pf.is_running());
        assert!(!pf.send_stop_signal().unwrap());
    }

    #[test]
    fn stale_pid_is_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("stale.pid");
        // PID 1 belongs to init inside most sandboxes and is not us, but a
        // genuinely unused high PID is a more reliable "definitely dead"
        // fixture across environments.
        std::fs::write(&pid_path, "999999").unwrap();
        let pf = PidFile::new(&pid_path);
        assert!(!pf.is_running());
    }

    #[test]
    fn remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("sharebox.pid");
        let pf = PidFile::new(&pid_path);
        pf.write_current().unwrap();
        pf.remove();
        assert!(!pid_path.exists());
    }
}
