//! The repository synchronizer.
//!
//! [`RepositorySynchronizer`] owns one clone's lifecycle and runs one
//! clean/pull/compare/notify cycle per invocation:
//!
//! 1. Clear the marker left by any previous invocation.
//! 2. Open the clone (precondition).
//! 3. Hard-reset the working tree, discarding local drift.
//! 4. Capture the head identifier before the pull.
//! 5. Fetch and fast-forward from the remote, under a deadline.
//! 6. Capture the head identifier after the pull.
//! 7. Compare full identifiers; on a move, publish the marker.
//!
//! Every step is guarded: a failure aborts the rest of the pipeline with a
//! stage-labelled error. Nothing is retried here; the caller owns retry
//! cadence, and the destructive reset at the top of the next invocation
//! recovers from any half-finished state.
//!
//! A lock prevents overlapping invocations against the same handle.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use crate::errors::{GitError, SyncError};
use crate::git::client::GitClient;
use crate::marker::CommitMarker;
use crate::models::{RepoHandle, SyncOutcome};

/// Default deadline for the pull stage.
pub const DEFAULT_PULL_TIMEOUT_SECS: u64 = 300;

/// Synchronizes one repository clone with its upstream and detects head
/// movement.
///
/// One instance per watched clone. Instances are independent; failures in
/// one never affect another. Within a single instance, at most one
/// `synchronize` call may be in flight -- an overlapping call fails with
/// [`SyncError::AlreadyRunning`] instead of racing the working tree.
pub struct RepositorySynchronizer {
    handle: RepoHandle,
    marker: CommitMarker,
    pull_timeout: Duration,
    /// Atomic flag preventing concurrent invocations on this handle.
    running: Arc<AtomicBool>,
}

impl RepositorySynchronizer {
    pub fn new(handle: RepoHandle, marker: CommitMarker, pull_timeout: Duration) -> Self {
        Self {
            handle,
            marker,
            pull_timeout,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn handle(&self) -> &RepoHandle {
        &self.handle
    }

    pub fn marker(&self) -> &CommitMarker {
        &self.marker
    }

    /// Check if an invocation is currently in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one synchronization cycle.
    ///
    /// Returns [`SyncOutcome::Unchanged`] when upstream had nothing new and
    /// [`SyncOutcome::Changed`] when the head moved (in which case the
    /// marker now holds the new identifier). Any stage failure aborts the
    /// invocation and leaves no marker behind.
    ///
    /// The lock is released via a drop guard so it is freed even if the
    /// cycle panics.
    #[instrument(skip(self), fields(repo = %self.handle.display_name()))]
    pub async fn synchronize(&self) -> Result<SyncOutcome, SyncError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning {
                repo: self.handle.path.display().to_string(),
            });
        }
        let _guard = RunLockGuard(self.running.clone());
        let started = Instant::now();

        // A marker from an earlier invocation describes old history. Drop it
        // before touching the clone so no consumer can pair a stale
        // identifier with this invocation.
        self.marker.clear().map_err(SyncError::Publish)?;

        let client = GitClient::open(&self.handle.path).map_err(SyncError::Precondition)?;

        let branch = match &self.handle.branch {
            Some(b) => b.clone(),
            None => client.current_branch().map_err(SyncError::Precondition)?,
        };

        client.reset_to_head().map_err(SyncError::Reset)?;

        let before = client.head_commit().map_err(SyncError::CaptureBefore)?;
        debug!(head = %before, branch = %branch, "captured baseline");

        self.pull_with_deadline(&branch).await?;

        let after = client.head_commit().map_err(SyncError::CaptureAfter)?;

        if before == after {
            debug!(head = %after, elapsed_ms = started.elapsed().as_millis() as u64, "no new commits");
            return Ok(SyncOutcome::Unchanged { head: after });
        }

        self.marker.publish(&after).map_err(SyncError::Publish)?;
        info!(
            previous = %before,
            current = %after,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "head moved"
        );
        Ok(SyncOutcome::Changed {
            previous: before,
            current: after,
        })
    }

    /// Run the pull stage on a blocking worker, raced against the deadline.
    ///
    /// git2 is synchronous and a hung network pull would otherwise block
    /// this repository's watcher indefinitely. On expiry the worker is
    /// abandoned and the invocation fails as a pull-stage timeout; the next
    /// invocation's reset restores a deterministic starting point.
    async fn pull_with_deadline(&self, branch: &str) -> Result<(), SyncError> {
        let path = self.handle.path.clone();
        let remote = self.handle.remote.clone();
        let token = self.handle.token.clone();
        let branch = branch.to_string();

        let task = tokio::task::spawn_blocking(move || {
            pull_blocking(&path, &remote, &branch, token.as_deref())
        });

        match tokio::time::timeout(self.pull_timeout, task).await {
            Err(_elapsed) => Err(SyncError::PullTimeout(self.pull_timeout.as_secs())),
            Ok(joined) => joined
                .map_err(|e| SyncError::Pull(GitError::Background(e.to_string())))?
                .map_err(SyncError::Pull),
        }
    }
}

// ---------------------------------------------------------------------------
// Standalone blocking pull (runs on the spawn_blocking worker)
// ---------------------------------------------------------------------------

/// Open the clone and pull `branch` from `remote`.
///
/// Standalone so the worker owns its own `git2::Repository` handle instead
/// of sharing one across the await point.
fn pull_blocking(
    path: &Path,
    remote: &str,
    branch: &str,
    token: Option<&str>,
) -> Result<(), GitError> {
    let client = GitClient::open(path)?;
    client.pull(remote, branch, token)
}

// ---------------------------------------------------------------------------
// Run lock RAII guard
// ---------------------------------------------------------------------------

/// Drop guard that resets the `running` flag to `false`.
///
/// This ensures the lock is always released, even if an invocation panics.
struct RunLockGuard(Arc<AtomicBool>);

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_guard_releases_on_drop() {
        let flag = Arc::new(AtomicBool::new(true));
        {
            let _guard = RunLockGuard(flag.clone());
        }
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_missing_clone_fails_precondition() {
        let dir = tempfile::tempdir().unwrap();
        let sync = RepositorySynchronizer::new(
            RepoHandle::new(dir.path().join("no-such-clone")),
            CommitMarker::new(dir.path().join(".commit_id")),
            Duration::from_secs(DEFAULT_PULL_TIMEOUT_SECS),
        );

        let err = sync.synchronize().await.unwrap_err();
        assert!(matches!(err, SyncError::Precondition(_)));
        assert!(!sync.marker().exists());
        // The lock must be released for the next poll tick.
        assert!(!sync.is_running());
    }
}
