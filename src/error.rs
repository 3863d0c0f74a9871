use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

/// A step of the branch and pull request workflow, used to say where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Clone,
    ProbeBranch,
    Checkout,
    Stage,
    Commit,
    Push,
    CreatePullRequest,
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Clone => "clone",
            Self::ProbeBranch => "check remote branch",
            Self::Checkout => "checkout",
            Self::Stage => "stage",
            Self::Commit => "commit",
            Self::Push => "push",
            Self::CreatePullRequest => "create pull request",
        })
    }
}

/// The remote or working copy is not in a state that allows the step.
///
/// Unlike transport errors these usually call for a different request
/// (another branch name, another base) rather than a plain retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("source reference {0} does not exist on the remote")]
    SourceMissing(String),
    #[error("branch {branch} already exists on the remote{}", render_detail(.detail))]
    BranchExists {
        branch: String,
        /// What git reported, when the conflict surfaced as a rejected push.
        detail: Option<String>,
    },
    #[error("nothing to commit, the changes match the source reference")]
    NothingToCommit,
    #[error("head {0} is the same as base")]
    HeadEqualsBase(String),
    #[error("no commits between base and head: {0}")]
    NoDiff(String),
    #[error("a pull request already exists: {0}")]
    DuplicatePullRequest(String),
    #[error("head branch does not exist: {0}")]
    HeadMissing(String),
}

fn render_detail(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(": {}", detail),
        None => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{step} failed for {target}: {detail}")]
    Transport {
        step: Step,
        target: String,
        detail: String,
    },

    #[error("{step} failed for {target}: {reason}")]
    Reference {
        step: Step,
        target: String,
        reason: ReferenceError,
    },

    #[error("failed to write {path} in the working copy: {source}")]
    LocalWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("branch {branch} was pushed to {target} but no pull request was opened: {source}")]
    OrphanBranch {
        target: String,
        branch: String,
        #[source]
        source: Box<WorkflowError>,
    },

    #[error("cancelled after {after:?}")]
    Cancelled { after: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    Transport,
    ReferenceState,
    LocalWrite,
    PartialSuccess,
    Cancelled,
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Reference { .. } => ErrorKind::ReferenceState,
            Self::LocalWrite { .. } => ErrorKind::LocalWrite,
            Self::OrphanBranch { .. } => ErrorKind::PartialSuccess,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// The reference-state reason, if this is a reference-state error.
    pub fn reference_reason(&self) -> Option<&ReferenceError> {
        match self {
            Self::Reference { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Whether the remote may hold a branch or commit left behind by the failed call.
    pub fn remote_may_be_mutated(&self) -> bool {
        matches!(self, Self::OrphanBranch { .. } | Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_step_and_target() {
        let err = WorkflowError::Reference {
            step: Step::Push,
            target: "acme/widgets".to_string(),
            reason: ReferenceError::BranchExists {
                branch: "bot/x".to_string(),
                detail: None,
            },
        };
        assert_eq!(
            err.to_string(),
            "push failed for acme/widgets: branch bot/x already exists on the remote"
        );
        assert_eq!(err.kind(), ErrorKind::ReferenceState);
        assert!(!err.remote_may_be_mutated());
    }

    #[test]
    fn test_branch_exists_keeps_git_output() {
        let reason = ReferenceError::BranchExists {
            branch: "bot/x".to_string(),
            detail: Some("! [rejected] bot/x -> bot/x (fetch first)".to_string()),
        };
        assert_eq!(
            reason.to_string(),
            "branch bot/x already exists on the remote: ! [rejected] bot/x -> bot/x (fetch first)"
        );
    }

    #[test]
    fn test_orphan_branch_is_partial_success() {
        let err = WorkflowError::OrphanBranch {
            target: "acme/widgets".to_string(),
            branch: "bot/x".to_string(),
            source: Box::new(WorkflowError::Transport {
                step: Step::CreatePullRequest,
                target: "acme/widgets".to_string(),
                detail: "Bad credentials".to_string(),
            }),
        };
        assert_eq!(err.kind(), ErrorKind::PartialSuccess);
        assert!(err.remote_may_be_mutated());
        assert!(err.to_string().contains("Bad credentials"));
    }
}
