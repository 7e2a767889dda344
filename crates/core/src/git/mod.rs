//! Git operations for RepoWatch.

pub mod client;

pub use client::GitClient;
