//! Local Git repository operations via `git2`.
//!
//! Everything goes through the library binding; no external `git` binary is
//! invoked, so failures arrive as typed errors instead of parsed exit codes.

use std::path::{Path, PathBuf};

use git2::{build::CheckoutBuilder, Cred, FetchOptions, ObjectType, RemoteCallbacks, Repository, ResetType};
use tracing::{debug, info, instrument};

use crate::errors::GitError;
use crate::models::CommitId;

/// High-level Git client wrapping a `git2::Repository`.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

impl GitClient {
    /// Open an existing Git repository at `repo_path`.
    ///
    /// The clone must already exist; RepoWatch never creates one.
    pub fn open<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        debug!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Name of the branch HEAD points at.
    pub fn current_branch(&self) -> Result<String, GitError> {
        let head = self.repo.head()?;
        if !head.is_branch() {
            return Err(GitError::DetachedHead);
        }
        head.shorthand()
            .map(str::to_string)
            .ok_or(GitError::DetachedHead)
    }

    /// Return the full identifier of HEAD.
    pub fn head_commit(&self) -> Result<CommitId, GitError> {
        let head = self.repo.head()?;
        let commit = head.peel_to_commit()?;
        Ok(CommitId::from(commit.id()))
    }

    /// Force the working tree to exactly match HEAD, discarding any
    /// uncommitted modifications. The clone is a disposable mirror, not a
    /// workspace; local drift is thrown away so the pull cannot be blocked
    /// by a dirty tree.
    #[instrument(skip(self), fields(path = %self.repo_path.display()))]
    pub fn reset_to_head(&self) -> Result<(), GitError> {
        let target = self.repo.head()?.peel(ObjectType::Commit)?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo.reset(&target, ResetType::Hard, Some(&mut checkout))?;
        debug!("working tree reset to HEAD");
        Ok(())
    }

    /// Fetch from a named remote.
    #[instrument(skip(self, token))]
    pub fn fetch(&self, remote_name: &str, token: Option<&str>) -> Result<(), GitError> {
        debug!(remote = remote_name, "fetching");
        let mut remote = self.repo.find_remote(remote_name)?;
        let mut callbacks = RemoteCallbacks::new();
        if let Some(tok) = token {
            let tok = tok.to_string();
            callbacks.credentials(move |_url, _username, _allowed| {
                Cred::userpass_plaintext("x-access-token", &tok)
            });
        }
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(callbacks);
        remote.fetch(&[] as &[&str], Some(&mut fetch_opts), None)?;
        debug!("fetch completed");
        Ok(())
    }

    /// Fast-forward `branch` to its remote-tracking counterpart.
    ///
    /// Up to date is a no-op. Anything that would require a merge fails
    /// with [`GitError::Diverged`]; conflict resolution belongs to a human,
    /// not to the watcher.
    #[instrument(skip(self))]
    pub fn fast_forward(&self, remote_name: &str, branch: &str) -> Result<(), GitError> {
        let fetch_ref = format!("refs/remotes/{}/{}", remote_name, branch);
        let fetch_commit = self
            .repo
            .find_reference(&fetch_ref)
            .map_err(|_| GitError::RefNotFound(fetch_ref.clone()))?
            .peel_to_commit()?;

        let annotated = self.repo.find_annotated_commit(fetch_commit.id())?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;

        if analysis.is_up_to_date() {
            debug!(branch, "already up to date");
            return Ok(());
        }
        if !analysis.is_fast_forward() {
            return Err(GitError::Diverged {
                branch: branch.to_string(),
            });
        }

        let head_ref = self.repo.head()?;
        if !head_ref.is_branch() {
            return Err(GitError::DetachedHead);
        }
        let refname = head_ref
            .name()
            .ok_or_else(|| GitError::RefNotFound("HEAD".to_string()))?
            .to_string();

        let mut reference = self.repo.find_reference(&refname)?;
        reference.set_target(fetch_commit.id(), "repowatch: fast-forward pull")?;
        self.repo.set_head(&refname)?;
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force()))?;

        info!(branch, target = %fetch_commit.id(), "fast-forwarded");
        Ok(())
    }

    /// Fetch and fast-forward merge.
    pub fn pull(&self, remote_name: &str, branch: &str, token: Option<&str>) -> Result<(), GitError> {
        self.fetch(remote_name, token)?;
        self.fast_forward(remote_name, branch)
    }
}
