//! Branch and pull request workflow.
//!
//! [`App::create_branch`] turns a set of file changes into one new commit on a
//! new remote branch:
//!
//! 1. Shallow clone the source reference into a scratch directory.
//! 2. Refuse to continue if the target branch already exists on the remote.
//! 3. Create the branch, write the files, stage, commit.
//! 4. Push the branch without force.
//!
//! [`App::create_pull_request`] opens a pull request for an already pushed
//! branch, and [`App::open_pull_request`] composes the two. Nothing is retried
//! and nothing is rolled back; a failure after the push is reported as
//! [`WorkflowError::OrphanBranch`].

use std::collections::BTreeMap;
use std::path::Path;

use log::info;
use tracing::instrument;

use crate::App;
use crate::error::ReferenceError;
use crate::error::Step;
use crate::error::WorkflowError;
use crate::ops::git::GitError;
use crate::ops::git::GitOps;
use crate::ops::github::GithubOps;
use crate::ops::github::NewPullRequest;
use crate::ops::github_curl::ApiError;
use crate::types::CreateBranchRequest;
use crate::types::CreatePullRequestRequest;
use crate::types::PullRequestCreated;
use crate::types::validate_change_path;

/// Name of the working copy inside the scratch directory.
const WORKTREE_DIR: &str = "worktree";

impl<G: GitOps, H> App<G, H> {
    /// Push a new branch holding one commit with `request.changes` on top of
    /// `request.source`.
    #[instrument(skip_all, fields(repo = %request.repo, branch = %request.branch))]
    pub async fn create_branch(&self, request: &CreateBranchRequest) -> Result<(), WorkflowError> {
        validate_changes(&request.changes)?;

        let target = request.repo.to_string();
        let auth = &self.config.git_auth;
        let url = self.remote_url(&request.repo);

        // Removed on drop, whichever way this function returns
        let scratch = tempfile::Builder::new()
            .prefix("ghkit-")
            .tempdir()
            .map_err(|source| WorkflowError::LocalWrite {
                path: std::env::temp_dir().display().to_string(),
                source,
            })?;
        let workdir = scratch.path().join(WORKTREE_DIR);

        self.git
            .clone_single_branch(&url, &request.source, &workdir, auth)
            .await
            .map_err(|err| git_step_error(Step::Clone, &target, err))?;
        info!("Cloned {} at {}", target, request.source);

        let exists = self
            .git
            .remote_branch_exists(&workdir, &request.branch, auth)
            .await
            .map_err(|err| git_step_error(Step::ProbeBranch, &target, err))?;
        if exists {
            return Err(WorkflowError::Reference {
                step: Step::ProbeBranch,
                target,
                reason: ReferenceError::BranchExists {
                    branch: request.branch.to_string(),
                    detail: None,
                },
            });
        }

        self.git
            .create_branch(&workdir, &request.branch)
            .await
            .map_err(|err| git_step_error(Step::Checkout, &target, err))?;

        write_changes(&workdir, &request.changes).await?;

        self.git
            .stage_all(&workdir)
            .await
            .map_err(|err| git_step_error(Step::Stage, &target, err))?;

        let commit = self
            .git
            .commit(&workdir, &request.message, &request.author)
            .await
            .map_err(|err| git_step_error(Step::Commit, &target, err))?;
        info!("Created commit {} on {}", commit, request.branch);

        self.git
            .push_branch(&workdir, &request.branch, auth)
            .await
            .map_err(|err| git_step_error(Step::Push, &target, err))?;
        info!("Pushed branch {} to {}", request.branch, target);

        Ok(())
    }
}

impl<G, H: GithubOps> App<G, H> {
    /// Open a pull request merging `request.head` into `request.base`.
    #[instrument(skip_all, fields(repo = %request.repo, head = %request.head, base = %request.base))]
    pub async fn create_pull_request(
        &self,
        request: &CreatePullRequestRequest,
    ) -> Result<PullRequestCreated, WorkflowError> {
        let target = request.repo.to_string();
        if request.head == request.base {
            return Err(WorkflowError::Reference {
                step: Step::CreatePullRequest,
                target,
                reason: ReferenceError::HeadEqualsBase(request.head.to_string()),
            });
        }

        let new_pr = NewPullRequest {
            title: request.title.clone(),
            head: request.head.to_string(),
            base: request.base.to_string(),
            body: request.body.clone(),
            draft: request.draft,
            maintainer_can_modify: true,
        };
        let pr = self
            .gh
            .create_pull_request(&request.repo, &new_pr)
            .await
            .map_err(|err| api_step_error(&target, err))?;
        info!("Created pull request #{} at {}", pr.number, pr.html_url);

        Ok(PullRequestCreated {
            number: pr.number,
            html_url: pr.html_url,
        })
    }
}

impl<G: GitOps, H: GithubOps> App<G, H> {
    /// Create the branch, then open a pull request from it against its source.
    pub async fn open_pull_request(
        &self,
        branch: &CreateBranchRequest,
        title: &str,
        body: &str,
        draft: bool,
    ) -> Result<PullRequestCreated, WorkflowError> {
        self.create_branch(branch).await?;

        let request = CreatePullRequestRequest {
            repo: branch.repo.clone(),
            base: branch.source.clone(),
            head: branch.branch.clone(),
            title: title.to_string(),
            body: body.to_string(),
            draft,
        };
        self.create_pull_request(&request)
            .await
            .map_err(|source| WorkflowError::OrphanBranch {
                target: branch.repo.to_string(),
                branch: branch.branch.to_string(),
                source: Box::new(source),
            })
    }
}

fn validate_changes(changes: &BTreeMap<String, Vec<u8>>) -> Result<(), WorkflowError> {
    if changes.is_empty() {
        return Err(WorkflowError::InvalidRequest(
            "change set is empty".to_string(),
        ));
    }
    for path in changes.keys() {
        validate_change_path(path).map_err(|err| WorkflowError::InvalidRequest(err.to_string()))?;
    }
    Ok(())
}

async fn write_changes(
    workdir: &Path,
    changes: &BTreeMap<String, Vec<u8>>,
) -> Result<(), WorkflowError> {
    for (path, content) in changes {
        let full_path = workdir.join(path);
        let local_write = |source| WorkflowError::LocalWrite {
            path: path.clone(),
            source,
        };
        refuse_symlinks(workdir, path).await.map_err(local_write)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(local_write)?;
        }
        tokio::fs::write(&full_path, content)
            .await
            .map_err(local_write)?;
    }
    Ok(())
}

/// Fails if any existing component of `path` below `workdir` is a symbolic
/// link. The clone comes from the remote, so a committed link could point
/// anywhere on this machine.
async fn refuse_symlinks(workdir: &Path, path: &str) -> std::io::Result<()> {
    let mut current = workdir.to_path_buf();
    for component in Path::new(path).components() {
        current.push(component);
        match tokio::fs::symlink_metadata(&current).await {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} is a symbolic link", current.display()),
                ));
            }
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn git_step_error(step: Step, target: &str, err: GitError) -> WorkflowError {
    let target = target.to_string();
    let reason = match err {
        GitError::ReferenceNotFound(reference) => ReferenceError::SourceMissing(reference),
        GitError::PushRejected { branch, output } => ReferenceError::BranchExists {
            branch,
            detail: Some(output),
        },
        GitError::NothingToCommit => ReferenceError::NothingToCommit,
        GitError::Spawn(_) | GitError::Failed { .. } => {
            return WorkflowError::Transport {
                step,
                target,
                detail: err.to_string(),
            };
        }
    };
    WorkflowError::Reference {
        step,
        target,
        reason,
    }
}

fn api_step_error(target: &str, err: ApiError) -> WorkflowError {
    let step = Step::CreatePullRequest;
    let target = target.to_string();
    let reason = if err.mentions("No commits between") {
        ReferenceError::NoDiff(err.to_string())
    } else if err.mentions("A pull request already exists") {
        ReferenceError::DuplicatePullRequest(err.to_string())
    } else if err.mentions("head invalid") {
        ReferenceError::HeadMissing(err.to_string())
    } else {
        return WorkflowError::Transport {
            step,
            target,
            detail: err.to_string(),
        };
    };
    WorkflowError::Reference {
        step,
        target,
        reason,
    }
}
