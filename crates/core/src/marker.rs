//! The commit marker artifact.
//!
//! A small well-known text file announcing a detected change to external
//! collaborators. It holds exactly one full commit identifier and nothing
//! else. The marker is removed at the start of every invocation and
//! recreated only when the head moved, so a crash mid-pull can never leave
//! a stale identifier from an earlier run for a consumer to misread.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::MarkerError;
use crate::models::CommitId;

/// Handle on one marker file location.
#[derive(Debug, Clone)]
pub struct CommitMarker {
    path: PathBuf,
}

impl CommitMarker {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Remove any marker left by a previous invocation. Absence is fine.
    pub fn clear(&self) -> Result<(), MarkerError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed previous marker");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MarkerError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Write the new head identifier: the identifier bytes exactly, no
    /// trailing newline, nothing else.
    pub fn publish(&self, id: &CommitId) -> Result<(), MarkerError> {
        std::fs::write(&self.path, id.as_str()).map_err(|source| MarkerError::Io {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), commit = %id, "published commit marker");
        Ok(())
    }

    /// Read the marker, if present. For the consumer side: trailing
    /// whitespace is tolerated, anything short of a full identifier is not.
    pub fn read(&self) -> Result<Option<CommitId>, MarkerError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(MarkerError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        match CommitId::parse(content.trim_end()) {
            Some(id) => Ok(Some(id)),
            None => Err(MarkerError::Malformed {
                path: self.path.clone(),
            }),
        }
    }
}
