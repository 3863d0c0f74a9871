#![allow(async_fn_in_trait)]

use std::fmt::Display;
use std::path::Path;
use std::process::Output;
use std::process::Stdio;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tokio::process::Command;
use tracing::instrument;

use crate::types::Author;
use crate::types::BranchName;

// -----------------------------------------------------------------------------
// GitOps trait

/// The version-control capabilities the workflow needs.
///
/// Every method works on the working copy at `dir`. Methods that talk to the
/// remote take the credential explicitly.
#[cfg_attr(test, automock)]
pub trait GitOps {
    /// Clone `reference` of `url` into `dest` with depth 1, no tags.
    async fn clone_single_branch(
        &self,
        url: &str,
        reference: &BranchName,
        dest: &Path,
        auth: &GitAuth,
    ) -> Result<(), GitError>;

    /// Whether `refs/heads/<branch>` exists on `origin`.
    async fn remote_branch_exists(
        &self,
        dir: &Path,
        branch: &BranchName,
        auth: &GitAuth,
    ) -> Result<bool, GitError>;

    /// Create `branch` at HEAD and switch to it.
    async fn create_branch(&self, dir: &Path, branch: &BranchName) -> Result<(), GitError>;

    async fn stage_all(&self, dir: &Path) -> Result<(), GitError>;

    /// Commit the index with `author` as author and committer.
    async fn commit(&self, dir: &Path, message: &str, author: &Author)
    -> Result<CommitId, GitError>;

    /// Push `branch` to `origin` under the same name, never forcing.
    async fn push_branch(
        &self,
        dir: &Path,
        branch: &BranchName,
        auth: &GitAuth,
    ) -> Result<(), GitError>;
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CommitId(pub String);

impl Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Credential used for clone, ls-remote and push over HTTP(S).
#[derive(Clone, PartialEq, Eq, Default)]
pub enum GitAuth {
    #[default]
    Anonymous,
    Basic { username: String, password: String },
}

impl std::fmt::Debug for GitAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

impl GitAuth {
    /// Git config passed through the environment so the secret stays out of argv.
    fn env(&self) -> Vec<(&'static str, String)> {
        let mut env = vec![("GIT_TERMINAL_PROMPT", "0".to_string())];
        if let Self::Basic { username, password } = self {
            let encoded = STANDARD.encode(format!("{username}:{password}"));
            env.push(("GIT_CONFIG_COUNT", "1".to_string()));
            env.push(("GIT_CONFIG_KEY_0", "http.extraHeader".to_string()));
            env.push((
                "GIT_CONFIG_VALUE_0",
                format!("Authorization: Basic {encoded}"),
            ));
        }
        env
    }
}

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to execute git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {command} failed: {output}")]
    Failed { command: String, output: String },

    #[error("reference {0} not found on the remote")]
    ReferenceNotFound(String),

    #[error("push of {branch} was rejected: {output}")]
    PushRejected { branch: String, output: String },

    #[error("nothing to commit")]
    NothingToCommit,
}

// -----------------------------------------------------------------------------
// RealGit

/// Real implementation that calls the git CLI
pub struct RealGit;

impl RealGit {
    async fn run(
        &self,
        dir: Option<&Path>,
        args: &[&str],
        env: &[(&'static str, String)],
    ) -> Result<Output, GitError> {
        log::debug!("$ git {}", args.join(" "));
        let mut command = Command::new("git");
        if let Some(dir) = dir {
            command.current_dir(dir);
        }
        let output = command
            .args(args)
            .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(output)
    }

    async fn run_checked(
        &self,
        dir: &Path,
        args: &[&str],
        env: &[(&'static str, String)],
    ) -> Result<String, GitError> {
        let output = self.run(Some(dir), args, env).await?;
        if !output.status.success() {
            return Err(GitError::Failed {
                command: args.join(" "),
                output: combined_output(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl GitOps for RealGit {
    #[instrument(skip_all, fields(reference = %reference))]
    async fn clone_single_branch(
        &self,
        url: &str,
        reference: &BranchName,
        dest: &Path,
        auth: &GitAuth,
    ) -> Result<(), GitError> {
        let dest = dest.to_string_lossy();
        let args = [
            "clone",
            "--quiet",
            "--depth",
            "1",
            "--single-branch",
            "--no-tags",
            "--branch",
            reference.as_str(),
            url,
            &*dest,
        ];
        let output = self.run(None, &args, &auth.env()).await?;
        if !output.status.success() {
            return Err(classify_clone_failure(reference.as_str(), &combined_output(&output)));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(branch = %branch))]
    async fn remote_branch_exists(
        &self,
        dir: &Path,
        branch: &BranchName,
        auth: &GitAuth,
    ) -> Result<bool, GitError> {
        let refname = format!("refs/heads/{}", branch);
        let stdout = self
            .run_checked(dir, &["ls-remote", "--heads", "origin", &refname], &auth.env())
            .await?;
        Ok(!stdout.is_empty())
    }

    #[instrument(skip_all, fields(branch = %branch))]
    async fn create_branch(&self, dir: &Path, branch: &BranchName) -> Result<(), GitError> {
        self.run_checked(dir, &["checkout", "--quiet", "-b", branch.as_str()], &[])
            .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn stage_all(&self, dir: &Path) -> Result<(), GitError> {
        self.run_checked(dir, &["add", "--all"], &[]).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn commit(
        &self,
        dir: &Path,
        message: &str,
        author: &Author,
    ) -> Result<CommitId, GitError> {
        let env = [
            ("GIT_AUTHOR_NAME", author.name.clone()),
            ("GIT_AUTHOR_EMAIL", author.email.clone()),
            ("GIT_COMMITTER_NAME", author.name.clone()),
            ("GIT_COMMITTER_EMAIL", author.email.clone()),
        ];
        // Exit code 0 means the index matches HEAD
        let staged = self
            .run(Some(dir), &["diff", "--cached", "--quiet"], &[])
            .await?;
        if staged.status.success() {
            return Err(GitError::NothingToCommit);
        }

        let args = [
            "-c",
            "commit.gpgsign=false",
            "commit",
            "--no-verify",
            "--message",
            message,
        ];
        let output = self.run(Some(dir), &args, &env).await?;
        if !output.status.success() {
            let text = combined_output(&output);
            if is_nothing_to_commit(&text) {
                return Err(GitError::NothingToCommit);
            }
            return Err(GitError::Failed {
                command: "commit".to_string(),
                output: text,
            });
        }

        let head = self.run_checked(dir, &["rev-parse", "HEAD"], &[]).await?;
        Ok(CommitId(head))
    }

    #[instrument(skip_all, fields(branch = %branch))]
    async fn push_branch(
        &self,
        dir: &Path,
        branch: &BranchName,
        auth: &GitAuth,
    ) -> Result<(), GitError> {
        let refspec = format!("refs/heads/{}:refs/heads/{}", branch, branch);
        let output = self
            .run(Some(dir), &["push", "origin", &refspec], &auth.env())
            .await?;
        if !output.status.success() {
            return Err(classify_push_failure(branch.as_str(), &combined_output(&output)));
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Output classification

fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{}\n{}", stdout.trim(), stderr.trim())
        .trim()
        .to_string()
}

fn classify_clone_failure(reference: &str, output: &str) -> GitError {
    if output.contains("not found in upstream") {
        GitError::ReferenceNotFound(reference.to_string())
    } else {
        GitError::Failed {
            command: "clone".to_string(),
            output: output.to_string(),
        }
    }
}

/// Only a conflict with an existing ref counts as a rejection. Hooks, branch
/// protection and permission checks report `[remote rejected]` with their own
/// reason and stay plain failures.
fn classify_push_failure(branch: &str, output: &str) -> GitError {
    const REF_CONFLICTS: [&str; 3] = ["(fetch first)", "(non-fast-forward)", "already exists"];
    if REF_CONFLICTS.iter().any(|marker| output.contains(marker)) {
        GitError::PushRejected {
            branch: branch.to_string(),
            output: output.to_string(),
        }
    } else {
        GitError::Failed {
            command: "push".to_string(),
            output: output.to_string(),
        }
    }
}

fn is_nothing_to_commit(output: &str) -> bool {
    output.contains("nothing to commit") || output.contains("no changes added to commit")
}
