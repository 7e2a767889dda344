//! RepoWatch core library.
//!
//! This crate provides the foundational components for repository change
//! detection: configuration, the Git repository client, the commit marker
//! artifact, and the synchronizer that runs one clean/pull/compare/notify
//! cycle per invocation.

pub mod config;
pub mod errors;
pub mod git;
pub mod marker;
pub mod models;
pub mod synchronizer;

// Re-exports for convenience.
pub use config::AppConfig;
pub use marker::CommitMarker;
pub use models::{CommitId, RepoHandle, SyncOutcome};
pub use synchronizer::RepositorySynchronizer;
