pub mod git;

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub use git::GitCli;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsOutput {
    pub success: bool,
    pub message: String,
}

pub trait Vcs {
    fn pull(&self, repo: &Path) -> Result<VcsOutput>;
    fn clone_into(&self, remote_url: &str, dest: &Path) -> Result<VcsOutput>;
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Pull,
    Clone,
}

impl Display for SyncAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pull => write!(f, "pull"),
            Self::Clone => write!(f, "clone"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub local_path: PathBuf,
    pub action: SyncAction,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Error)]
#[error("{action} into {} failed: {message}", local_path.display())]
pub struct SyncFailed {
    pub local_path: PathBuf,
    pub action: SyncAction,
    pub message: String,
}

impl SyncOutcome {
    pub fn ensure_success(&self) -> Result<(), SyncFailed> {
        if self.success {
            return Ok(());
        }
        Err(SyncFailed {
            local_path: self.local_path.clone(),
            action: self.action,
            message: self.message.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceSync<V = GitCli> {
    vcs: V,
}

impl<V: Vcs> SourceSync<V> {
    pub fn new(vcs: V) -> Self {
        Self { vcs }
    }

    /// Pulls when `local_path` exists, clones `remote_url` into it otherwise.
    /// A command that ran but failed is reported in the outcome, not as `Err`.
    pub fn sync(&self, local_path: &Path, remote_url: &str) -> Result<SyncOutcome> {
        let (action, output) = if local_path.is_dir() {
            info!(path = %local_path.display(), "pulling newest data");
            (SyncAction::Pull, self.vcs.pull(local_path)?)
        } else {
            info!(path = %local_path.display(), "local copy missing, cloning");
            if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed creating clone directory: {}", parent.display())
                })?;
            }
            (SyncAction::Clone, self.vcs.clone_into(remote_url, local_path)?)
        };

        if output.success {
            info!(%action, output = %output.message, "sync finished");
        } else {
            warn!(%action, output = %output.message, "sync failed");
        }
        Ok(SyncOutcome {
            local_path: local_path.to_path_buf(),
            action,
            success: output.success,
            message: output.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    use anyhow::Result;

    use super::{SourceSync, SyncAction, Vcs, VcsOutput};

    #[derive(Default)]
    struct FakeVcs {
        succeed: bool,
        calls: RefCell<Vec<String>>,
    }

    impl FakeVcs {
        fn output(&self) -> VcsOutput {
            VcsOutput {
                success: self.succeed,
                message: if self.succeed { "ok" } else { "fatal: repository not found" }
                    .to_string(),
            }
        }
    }

    impl Vcs for FakeVcs {
        fn pull(&self, repo: &Path) -> Result<VcsOutput> {
            self.calls.borrow_mut().push(format!("pull {}", repo.display()));
            Ok(self.output())
        }

        fn clone_into(&self, remote_url: &str, dest: &Path) -> Result<VcsOutput> {
            self.calls
                .borrow_mut()
                .push(format!("clone {remote_url} {}", dest.display()));
            Ok(self.output())
        }
    }

    #[test]
    fn pulls_existing_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let sync = SourceSync::new(FakeVcs {
            succeed: true,
            ..Default::default()
        });
        let outcome = sync.sync(dir.path(), "https://example.com/data.git").unwrap();
        assert_eq!(outcome.action, SyncAction::Pull);
        assert!(outcome.ensure_success().is_ok());
        assert_eq!(
            sync.vcs.calls.borrow().as_slice(),
            [format!("pull {}", dir.path().display())]
        );
    }

    #[test]
    fn clones_missing_checkout_after_creating_parent() {
        let dir = tempfile::tempdir().unwrap();
        let dest: PathBuf = dir.path().join("repos").join("covid-19-data");
        let sync = SourceSync::new(FakeVcs {
            succeed: true,
            ..Default::default()
        });
        let outcome = sync.sync(&dest, "https://example.com/data.git").unwrap();
        assert_eq!(outcome.action, SyncAction::Clone);
        assert!(dir.path().join("repos").is_dir());
        assert_eq!(
            sync.vcs.calls.borrow().as_slice(),
            [format!("clone https://example.com/data.git {}", dest.display())]
        );
    }

    #[test]
    fn failed_command_is_reported_not_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let sync = SourceSync::new(FakeVcs::default());
        let outcome = sync
            .sync(&dir.path().join("missing"), "https://example.com/nope.git")
            .unwrap();
        assert!(!outcome.success);
        let err = outcome.ensure_success().unwrap_err();
        assert!(err.to_string().contains("repository not found"));
    }
}
