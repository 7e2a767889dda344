//! Domain model types used throughout RepoWatch.
//!
//! These types bridge the synchronizer, the marker artifact, and the
//! daemon/CLI front ends.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Commit identifier
// ---------------------------------------------------------------------------

/// A full, unabbreviated commit identifier.
///
/// Always the canonical 40-character hexadecimal hash. Change detection is
/// string equality over the full identifier; abbreviated prefixes are never
/// accepted, because two distinct commits can share a short prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    /// Parse a full commit identifier. Returns `None` for anything that is
    /// not exactly 40 hexadecimal characters.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(s.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<git2::Oid> for CommitId {
    fn from(oid: git2::Oid) -> Self {
        // Oid::to_string always renders the full 40-character hash.
        Self(oid.to_string())
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Repository handle
// ---------------------------------------------------------------------------

/// The filesystem location of a working clone plus the upstream coordinates
/// needed to pull it.
///
/// The clone must already exist with the named remote configured; the
/// synchronizer never creates, clones, or deletes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoHandle {
    /// Path to the working clone.
    pub path: PathBuf,

    /// Remote to pull from.
    pub remote: String,

    /// Branch to pull. `None` means the branch currently checked out.
    pub branch: Option<String>,

    /// Auth token for the remote, if it needs one. Never serialized.
    #[serde(skip)]
    pub token: Option<String>,
}

impl RepoHandle {
    /// A handle for `path` pulling `origin` on the checked-out branch.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            remote: "origin".to_string(),
            branch: None,
            token: None,
        }
    }

    /// Short human-readable name for logs: the clone's directory name.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

// ---------------------------------------------------------------------------
// Synchronization outcome
// ---------------------------------------------------------------------------

/// The result of one successful synchronization attempt.
///
/// Failures are the `Err` side of the synchronize call; see
/// [`crate::errors::SyncError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SyncOutcome {
    /// Upstream had nothing new; the head did not move.
    Unchanged { head: CommitId },

    /// The head moved. `current` is the identifier published to the marker.
    Changed {
        previous: CommitId,
        current: CommitId,
    },
}

impl SyncOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    /// The head identifier after the invocation, whichever way it went.
    pub fn head(&self) -> &CommitId {
        match self {
            Self::Unchanged { head } => head,
            Self::Changed { current, .. } => current,
        }
    }
}
