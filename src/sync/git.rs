use std::path::Path;
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};

use crate::sync::{Vcs, VcsOutput};

#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    fn run(command: &mut Command, what: &str) -> Result<VcsOutput> {
        let output = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("failed to execute {what}"))?;
        Ok(VcsOutput::from(output))
    }
}

impl Vcs for GitCli {
    fn pull(&self, repo: &Path) -> Result<VcsOutput> {
        Self::run(
            Command::new("git").arg("pull").current_dir(repo),
            "git pull",
        )
    }

    fn clone_into(&self, remote_url: &str, dest: &Path) -> Result<VcsOutput> {
        Self::run(
            Command::new("git").arg("clone").arg(remote_url).arg(dest),
            "git clone",
        )
    }
}

impl From<Output> for VcsOutput {
    fn from(output: Output) -> Self {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = [stdout.trim(), stderr.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            success: output.status.success(),
            message,
        }
    }
}
