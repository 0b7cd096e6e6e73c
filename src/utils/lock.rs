//! Cross-process lock around the install phase.
//!
//! Two installer runs against the same install directory must not swap the
//! binary concurrently. The lock is an OS-level exclusive lock on
//! `<install_dir>/.aiup.lock`, released when the [`InstallLock`] is dropped.
//! The lock file itself stays in place: every run must lock the same inode.
//!
//! File operations run under `spawn_blocking` so a slow file system does not
//! stall the runtime.

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS, default_lock_timeout};
use crate::core::AiupError;
use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

/// File name of the lock inside the install directory.
pub const LOCK_FILE_NAME: &str = ".aiup.lock";

/// Exclusive lock on an install directory.
///
/// # Example
///
/// ```rust,no_run
/// use aiup_cli::utils::lock::InstallLock;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let _lock = InstallLock::acquire(Path::new("/home/me/Applications/cursor")).await?;
/// // swap the binary...
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InstallLock {
    /// Held open for the lifetime of the lock
    _file: Arc<File>,
    lock_path: PathBuf,
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        // Unlinking here would let a waiter lock the orphaned inode while a
        // newcomer locks a fresh file at the same path
        debug!(path = %self.lock_path.display(), "Install lock released");
    }
}

impl InstallLock {
    /// Acquire the lock for `install_dir` with the default 30 second timeout.
    pub async fn acquire(install_dir: &Path) -> Result<Self> {
        Self::acquire_with_timeout(install_dir, default_lock_timeout()).await
    }

    /// Acquire the lock, giving up after `timeout`.
    ///
    /// Creates `install_dir` if needed. Polls with `try_lock_exclusive` and
    /// exponential backoff (10ms up to 500ms).
    ///
    /// # Errors
    ///
    /// [`AiupError::LockTimeout`] if another holder keeps the lock past
    /// `timeout`; an I/O error if the directory or lock file cannot be created.
    pub async fn acquire_with_timeout(install_dir: &Path, timeout: Duration) -> Result<Self> {
        tokio::fs::create_dir_all(install_dir).await.with_context(|| {
            format!("Failed to create install directory: {}", install_dir.display())
        })?;

        let lock_path = install_dir.join(LOCK_FILE_NAME);
        debug!(path = %lock_path.display(), "Waiting for install lock");

        let open_path = lock_path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&open_path)
        })
        .await
        .context("spawn_blocking panicked")?
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
        let file = Arc::new(file);

        let start = std::time::Instant::now();
        let backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            let attempt = Arc::clone(&file);
            let locked = tokio::task::spawn_blocking(move || attempt.try_lock_exclusive())
                .await
                .context("spawn_blocking panicked")?;

            if let Ok(true) = locked {
                debug!(
                    path = %lock_path.display(),
                    wait_ms = start.elapsed().as_millis(),
                    "Install lock acquired"
                );
                return Ok(Self {
                    _file: file,
                    lock_path,
                });
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(delay.min(remaining)).await;
        }

        Err(AiupError::LockTimeout {
            path: lock_path.display().to_string(),
        }
        .into())
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;
    use tokio::sync::Barrier;

    #[tokio::test]
    async fn test_lock_acquire_and_release() {
        let temp = TempDir::new().unwrap();
        let install_dir = temp.path().join("app");

        let lock = InstallLock::acquire(&install_dir).await.unwrap();
        let lock_path = install_dir.join(LOCK_FILE_NAME);
        assert_eq!(lock.path(), lock_path);
        assert!(lock_path.exists());

        drop(lock);
        assert!(lock_path.exists());

        let again = InstallLock::acquire_with_timeout(&install_dir, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(again.path(), lock_path);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let dir = Arc::new(temp.path().to_path_buf());
        let barrier = Arc::new(Barrier::new(2));

        let (dir1, barrier1) = (dir.clone(), barrier.clone());
        let holder = tokio::spawn(async move {
            let _lock = InstallLock::acquire(&dir1).await.unwrap();
            barrier1.wait().await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let waiter = tokio::spawn(async move {
            barrier.wait().await;
            let start = Instant::now();
            let _lock = InstallLock::acquire(&dir).await.unwrap();
            assert!(start.elapsed() >= Duration::from_millis(50));
        });

        holder.await.unwrap();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_handoff_stays_exclusive() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().to_path_buf();

        let first = InstallLock::acquire(&dir).await.unwrap();

        let waiter_dir = dir.clone();
        let (acquired_tx, acquired_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let waiter = tokio::spawn(async move {
            let _lock = InstallLock::acquire(&waiter_dir).await.unwrap();
            acquired_tx.send(()).unwrap();
            release_rx.await.unwrap();
        });

        // Let the waiter open the lock file before the first holder lets go
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(first);
        acquired_rx.await.unwrap();

        let third = InstallLock::acquire_with_timeout(&dir, Duration::from_millis(300)).await;
        assert!(matches!(
            third.unwrap_err().downcast_ref::<AiupError>(),
            Some(AiupError::LockTimeout { .. })
        ));

        release_tx.send(()).unwrap();
        waiter.await.unwrap();
        assert!(InstallLock::acquire_with_timeout(&dir, Duration::from_millis(300)).await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_timeout() {
        let temp = TempDir::new().unwrap();
        let _held = InstallLock::acquire(temp.path()).await.unwrap();

        let err = InstallLock::acquire_with_timeout(temp.path(), Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<AiupError>(), Some(AiupError::LockTimeout { .. })));
    }
}
