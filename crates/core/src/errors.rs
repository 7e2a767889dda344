//! Error types for the RepoWatch core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Marker(#[from] MarkerError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local Git (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A ref (branch, remote-tracking ref) could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// Local and upstream history have diverged; a fast-forward is impossible.
    #[error("history diverged on branch '{branch}': fast-forward impossible")]
    Diverged { branch: String },

    /// HEAD does not point at a branch.
    #[error("HEAD is detached; a checked-out branch is required")]
    DetachedHead,

    /// A background worker running a git operation died before finishing.
    #[error("background git task failed: {0}")]
    Background(String),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Marker errors
// ---------------------------------------------------------------------------

/// Errors from the commit-marker artifact.
#[derive(Debug, Error)]
pub enum MarkerError {
    /// Reading, writing, or removing the marker file failed.
    #[error("marker I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The marker file exists but does not hold a full commit identifier.
    #[error("malformed marker at '{path}': expected a full commit identifier")]
    Malformed { path: PathBuf },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Synchronization errors
// ---------------------------------------------------------------------------

/// The pipeline stage a synchronization failure belongs to.
///
/// Stage labels are stable strings surfaced in error messages and logs;
/// callers that retry or alert per stage match on this enum rather than
/// on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    /// Opening the clone: path missing or not a repository.
    Precondition,
    /// Forcing the working tree back to HEAD.
    Reset,
    /// Reading the head identifier before the pull.
    CaptureBefore,
    /// Fetching and fast-forwarding from the remote.
    Pull,
    /// Reading the head identifier after the pull.
    CaptureAfter,
    /// Removing or writing the commit marker.
    Publish,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Precondition => write!(f, "precondition"),
            Self::Reset => write!(f, "reset"),
            Self::CaptureBefore => write!(f, "capture_before"),
            Self::Pull => write!(f, "pull"),
            Self::CaptureAfter => write!(f, "capture_after"),
            Self::Publish => write!(f, "publish"),
        }
    }
}

/// Errors from one synchronization attempt, one variant per pipeline stage.
///
/// Each stage-labelled variant is the execution guard for its step: the
/// synchronizer maps every step's error into its variant and aborts the
/// rest of the pipeline with `?`, so a failure always names the stage that
/// stopped the invocation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another synchronize call is already in flight for the same handle.
    #[error("synchronization already in progress for '{repo}'")]
    AlreadyRunning { repo: String },

    /// The target path is missing or not a usable repository clone.
    #[error("precondition stage failed: {0}")]
    Precondition(#[source] GitError),

    /// The working tree could not be forced back to HEAD.
    #[error("reset stage failed: {0}")]
    Reset(#[source] GitError),

    /// The pre-pull head identifier could not be read.
    #[error("capture_before stage failed: {0}")]
    CaptureBefore(#[source] GitError),

    /// Fetching or fast-forwarding from the remote failed.
    #[error("pull stage failed: {0}")]
    Pull(#[source] GitError),

    /// The pull stage exceeded its deadline.
    #[error("pull stage timed out after {0}s")]
    PullTimeout(u64),

    /// The post-pull head identifier could not be read.
    #[error("capture_after stage failed: {0}")]
    CaptureAfter(#[source] GitError),

    /// The commit marker could not be removed or written.
    #[error("publish stage failed: {0}")]
    Publish(#[source] MarkerError),
}

impl SyncError {
    /// The pipeline stage this failure belongs to, if any.
    ///
    /// [`SyncError::AlreadyRunning`] is a caller-contention error, not a
    /// stage failure, and returns `None`.
    pub fn stage(&self) -> Option<SyncStage> {
        match self {
            Self::AlreadyRunning { .. } => None,
            Self::Precondition(_) => Some(SyncStage::Precondition),
            Self::Reset(_) => Some(SyncStage::Reset),
            Self::CaptureBefore(_) => Some(SyncStage::CaptureBefore),
            Self::Pull(_) | Self::PullTimeout(_) => Some(SyncStage::Pull),
            Self::CaptureAfter(_) => Some(SyncStage::CaptureAfter),
            Self::Publish(_) => Some(SyncStage::Publish),
        }
    }
}
