//! Exclusive access to the state file across boxo processes.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context as _, Result};
use tracing::{debug, warn};

const RETRY_EVERY: Duration = Duration::from_millis(50);

/// A `<state>.lock` file created exclusively and removed on drop.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
    _file: File,
}

impl StateLock {
    /// Take the lock for `state_path`, waiting up to `timeout` for another
    /// process to release it.
    pub async fn acquire(state_path: &Path, timeout: Duration) -> Result<Self> {
        let path = lock_path(state_path);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // The pid is informational only.
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!(path = %path.display(), "State lock taken");
                    return Ok(Self { path, _file: file });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if started.elapsed() >= timeout {
                        let holder = std::fs::read_to_string(&path).unwrap_or_default();
                        bail!(
                            "State is locked by another boxo process (pid {}). \
                             Remove {} if no such process is running.",
                            holder.trim(),
                            path.display()
                        );
                    }
                    tokio::time::sleep(RETRY_EVERY).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to create lock file: {}", path.display())
                    })
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove state lock");
        }
    }
}

fn lock_path(state_path: &Path) -> PathBuf {
    let mut name = state_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("nested/state.json");

        let held = StateLock::acquire(&state, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(held.path(), dir.path().join("nested/state.json.lock"));
        assert!(held.path().exists());

        let err = StateLock::acquire(&state, Duration::from_millis(120))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("locked by another boxo process"));
        assert!(err.to_string().contains(&std::process::id().to_string()));

        drop(held);
        assert!(!dir.path().join("nested/state.json.lock").exists());
        StateLock::acquire(&state, Duration::from_millis(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_waiter_gets_the_lock_once_released() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        let held = StateLock::acquire(&state, Duration::ZERO).await.unwrap();

        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { StateLock::acquire(&state, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiter.is_finished());

        drop(held);
        let taken = waiter.await.unwrap().unwrap();
        assert!(taken.path().exists());
    }
}
