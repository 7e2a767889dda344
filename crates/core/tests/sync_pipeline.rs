//! Integration tests for the clean/pull/compare/notify pipeline.
//!
//! These tests exercise the full synchronizer using real local repositories
//! built with `git2`: an "upstream" repo plays the remote (cloned over the
//! local path transport), a clone plays the watched working copy. No
//! network I/O.

use std::path::Path;
use std::time::Duration;

use git2::Repository;
use tempfile::TempDir;

use repowatch_core::errors::{GitError, SyncError, SyncStage};
use repowatch_core::marker::CommitMarker;
use repowatch_core::models::{RepoHandle, SyncOutcome};
use repowatch_core::synchronizer::RepositorySynchronizer;

// ===========================================================================
// Helper functions
// ===========================================================================

/// Write `content` to `name`, stage it, and commit. Returns the new oid.
fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) -> git2::Oid {
    let workdir = repo.workdir().expect("bare repo in test");
    std::fs::write(workdir.join(name), content).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree_oid = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    let sig = git2::Signature::now("Upstream", "upstream@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// Fixture: an upstream repository with one commit, and a watched clone.
struct Fixture {
    _dir: TempDir,
    upstream: Repository,
    clone_path: std::path::PathBuf,
    marker_path: std::path::PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let upstream_path = dir.path().join("upstream");
        let upstream = Repository::init(&upstream_path).unwrap();
        commit_file(&upstream, "README.md", "hello", "initial commit");

        let clone_path = dir.path().join("clone");
        Repository::clone(upstream_path.to_str().unwrap(), &clone_path).unwrap();

        let marker_path = dir.path().join(".commit_id");
        Self {
            _dir: dir,
            upstream,
            clone_path,
            marker_path,
        }
    }

    fn synchronizer(&self) -> RepositorySynchronizer {
        RepositorySynchronizer::new(
            RepoHandle::new(&self.clone_path),
            CommitMarker::new(&self.marker_path),
            Duration::from_secs(30),
        )
    }

    fn clone_repo(&self) -> Repository {
        Repository::open(&self.clone_path).unwrap()
    }
}

// ===========================================================================
// Pipeline behaviour
// ===========================================================================

#[tokio::test]
async fn unchanged_is_idempotent_and_writes_no_marker() {
    let fx = Fixture::new();
    let sync = fx.synchronizer();

    for _ in 0..3 {
        let outcome = sync.synchronize().await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Unchanged { .. }));
        assert!(!sync.marker().exists());
    }
    assert!(!sync.is_running());
}

#[tokio::test]
async fn detects_upstream_advance_exactly_once() {
    let fx = Fixture::new();
    let sync = fx.synchronizer();

    let baseline = sync.synchronize().await.unwrap();
    let before = baseline.head().clone();

    let new_oid = commit_file(&fx.upstream, "src.rs", "fn main() {}", "add source");

    let outcome = sync.synchronize().await.unwrap();
    match &outcome {
        SyncOutcome::Changed { previous, current } => {
            assert_eq!(previous, &before);
            assert_eq!(current.as_str(), new_oid.to_string());
        }
        other => panic!("expected Changed, got {:?}", other),
    }

    // Marker holds exactly the new identifier: full hash, no extra bytes.
    let bytes = std::fs::read(&fx.marker_path).unwrap();
    assert_eq!(bytes, new_oid.to_string().as_bytes());
    assert_eq!(bytes.len(), 40);

    // The next invocation sees no further movement and, per the
    // remove-then-maybe-rewrite contract, ends with the marker gone.
    let outcome = sync.synchronize().await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Unchanged { .. }));
    assert!(!sync.marker().exists());
}

#[tokio::test]
async fn discards_dirty_tree_before_comparing() {
    let fx = Fixture::new();
    let sync = fx.synchronizer();
    sync.synchronize().await.unwrap();

    // Local drift in the watched clone: the reset must throw this away
    // rather than letting it block the pull.
    std::fs::write(fx.clone_path.join("README.md"), "local scribbles").unwrap();

    commit_file(&fx.upstream, "README.md", "upstream edit", "rewrite readme");

    let outcome = sync.synchronize().await.unwrap();
    assert!(outcome.is_changed());

    let content = std::fs::read_to_string(fx.clone_path.join("README.md")).unwrap();
    assert_eq!(content, "upstream edit");
}

#[tokio::test]
async fn clone_ahead_of_upstream_is_unchanged() {
    let fx = Fixture::new();
    let sync = fx.synchronizer();
    sync.synchronize().await.unwrap();

    // A commit that exists only locally: upstream has nothing new to
    // integrate, so the head does not move and nothing is published.
    let local = fx.clone_repo();
    commit_file(&local, "local.txt", "local work", "local-only commit");

    let outcome = sync.synchronize().await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Unchanged { .. }));
    assert!(!sync.marker().exists());
}

#[tokio::test]
async fn diverged_history_fails_pull_stage() {
    let fx = Fixture::new();
    let sync = fx.synchronizer();
    sync.synchronize().await.unwrap();

    let local = fx.clone_repo();
    commit_file(&local, "ours.txt", "ours", "local commit");
    commit_file(&fx.upstream, "theirs.txt", "theirs", "upstream commit");

    let err = sync.synchronize().await.unwrap_err();
    assert_eq!(err.stage(), Some(SyncStage::Pull));
    assert!(matches!(err, SyncError::Pull(GitError::Diverged { .. })));
    assert!(!sync.marker().exists());
}

// ===========================================================================
// Failure isolation
// ===========================================================================

#[tokio::test]
async fn missing_clone_fails_precondition_without_marker() {
    let dir = TempDir::new().unwrap();
    let sync = RepositorySynchronizer::new(
        RepoHandle::new(dir.path().join("not-a-clone")),
        CommitMarker::new(dir.path().join(".commit_id")),
        Duration::from_secs(30),
    );

    let err = sync.synchronize().await.unwrap_err();
    assert_eq!(err.stage(), Some(SyncStage::Precondition));
    assert!(!sync.marker().exists());
}

#[tokio::test]
async fn failed_pull_clears_marker_and_never_recreates_it() {
    let fx = Fixture::new();
    let sync = fx.synchronizer();

    // A marker from an earlier successful run.
    commit_file(&fx.upstream, "a.txt", "a", "advance");
    let outcome = sync.synchronize().await.unwrap();
    assert!(outcome.is_changed());
    assert!(sync.marker().exists());

    // Break the remote to simulate an unreachable upstream.
    let local = fx.clone_repo();
    local
        .remote_set_url("origin", "/nonexistent/upstream/path")
        .unwrap();

    let err = sync.synchronize().await.unwrap_err();
    assert_eq!(err.stage(), Some(SyncStage::Pull));

    // The invocation removed the stale marker at its start and must not
    // have written a new one on the failed attempt.
    assert!(!sync.marker().exists());
}

#[tokio::test]
async fn configured_branch_missing_on_remote_fails_pull() {
    let fx = Fixture::new();
    let mut handle = RepoHandle::new(&fx.clone_path);
    handle.branch = Some("no-such-branch".to_string());
    let sync = RepositorySynchronizer::new(
        handle,
        CommitMarker::new(&fx.marker_path),
        Duration::from_secs(30),
    );

    let err = sync.synchronize().await.unwrap_err();
    assert_eq!(err.stage(), Some(SyncStage::Pull));
    assert!(matches!(err, SyncError::Pull(GitError::RefNotFound(_))));
}

#[tokio::test]
async fn sequential_invocations_release_the_lock() {
    let fx = Fixture::new();
    let sync = fx.synchronizer();

    sync.synchronize().await.unwrap();
    assert!(!sync.is_running());
    commit_file(&fx.upstream, "b.txt", "b", "advance again");
    let outcome = sync.synchronize().await.unwrap();
    assert!(outcome.is_changed());
    assert!(!sync.is_running());
}
