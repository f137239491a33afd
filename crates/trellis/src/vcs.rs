//! Version-control collaborator.
//!
//! The store calls into version control only at operation boundaries:
//! switching to a ticket's branch when work starts, and optionally
//! committing after a mutation. Nothing in the store's own invariants
//! depends on what version control reports.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Version-control operations used by the store.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Creates a branch at the current commit. Succeeds if it already exists.
    async fn create_branch(&self, name: &str) -> Result<()>;

    /// Switches to an existing branch.
    async fn checkout(&self, name: &str) -> Result<()>;

    /// Stages the given paths and commits them.
    async fn stage_and_commit(&self, paths: &[PathBuf], message: &str) -> Result<()>;

    /// Name of the checked-out branch.
    async fn current_branch(&self) -> Result<String>;
}

/// [`VersionControl`] that does nothing, for trees outside a repository.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVcs;

#[async_trait]
impl VersionControl for NoVcs {
    async fn create_branch(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn checkout(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn stage_and_commit(&self, _paths: &[PathBuf], _message: &str) -> Result<()> {
        Ok(())
    }

    async fn current_branch(&self) -> Result<String> {
        Err(Error::Vcs("not a version-controlled directory".to_string()))
    }
}

/// [`VersionControl`] that runs the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
}

impl GitCli {
    /// Operates on the repository containing `repo`.
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    /// Whether `dir` is the top of a git work tree.
    pub fn is_repository(dir: &Path) -> bool {
        dir.join(".git").exists()
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        tracing::debug!(?args, repo = %self.repo.display(), "Running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .output()
            .await
            .map_err(|e| Error::Vcs(format!("failed to run git: {e}")))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(Error::Vcs(format!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    async fn branch_exists(&self, name: &str) -> bool {
        let reference = format!("refs/heads/{name}");
        self.git(&["rev-parse", "--verify", "--quiet", &reference])
            .await
            .is_ok()
    }
}

/// `git commit` limited to `paths`, so anything else the user staged stays
/// staged.
fn commit_args<'a>(message: &'a str, paths: &'a [String]) -> Vec<&'a str> {
    let mut args = vec!["commit", "--quiet", "-m", message, "--"];
    args.extend(paths.iter().map(String::as_str));
    args
}

#[async_trait]
impl VersionControl for GitCli {
    async fn create_branch(&self, name: &str) -> Result<()> {
        if self.branch_exists(name).await {
            return Ok(());
        }
        self.git(&["branch", name]).await.map(|_| ())
    }

    async fn checkout(&self, name: &str) -> Result<()> {
        self.git(&["checkout", name]).await.map(|_| ())
    }

    async fn stage_and_commit(&self, paths: &[PathBuf], message: &str) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();

        let mut add = vec!["add", "--all", "--"];
        add.extend(paths.iter().map(String::as_str));
        self.git(&add).await?;

        self.git(&commit_args(message, &paths)).await.map(|_| ())
    }

    async fn current_branch(&self) -> Result<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use recording::{RecordingVcs, VcsCall};

#[cfg(any(test, feature = "test-util"))]
mod recording {
    use super::VersionControl;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tokio::sync::Mutex;

    /// A call made to [`RecordingVcs`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum VcsCall {
        /// `create_branch(name)`
        CreateBranch(String),
        /// `checkout(name)`
        Checkout(String),
        /// `stage_and_commit(paths, message)`
        Commit(Vec<PathBuf>, String),
    }

    /// [`VersionControl`] that records calls, for tests.
    #[derive(Debug, Default)]
    pub struct RecordingVcs {
        calls: Mutex<Vec<VcsCall>>,
        branch: Mutex<String>,
        fail: bool,
    }

    impl RecordingVcs {
        /// A recorder where every call succeeds.
        pub fn new() -> Self {
            Self {
                branch: Mutex::new("main".to_string()),
                ..Self::default()
            }
        }

        /// A recorder where every call fails.
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        /// Calls made so far.
        pub async fn calls(&self) -> Vec<VcsCall> {
            self.calls.lock().await.clone()
        }

        async fn record(&self, call: VcsCall) -> Result<()> {
            self.calls.lock().await.push(call);
            if self.fail {
                return Err(Error::Vcs("recording backend told to fail".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl VersionControl for RecordingVcs {
        async fn create_branch(&self, name: &str) -> Result<()> {
            self.record(VcsCall::CreateBranch(name.to_string())).await
        }

        async fn checkout(&self, name: &str) -> Result<()> {
            self.record(VcsCall::Checkout(name.to_string())).await?;
            *self.branch.lock().await = name.to_string();
            Ok(())
        }

        async fn stage_and_commit(&self, paths: &[PathBuf], message: &str) -> Result<()> {
            self.record(VcsCall::Commit(paths.to_vec(), message.to_string()))
                .await
        }

        async fn current_branch(&self) -> Result<String> {
            Ok(self.branch.lock().await.clone())
        }
    }
}
