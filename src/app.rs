use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::error::WorkflowError;
use crate::types::RepoId;

pub struct App<G, H> {
    pub config: Config,
    pub git: G,
    pub gh: H,
}

impl<G, H> App<G, H> {
    pub fn new(config: Config, git: G, gh: H) -> Self {
        Self { config, git, gh }
    }

    /// URL of the repository. Used both for git transport and for links in output.
    pub fn remote_url(&self, repo: &RepoId) -> String {
        format!("{}/{}/{}", self.config.git_base_url, repo.owner, repo.repo)
    }
}

/// Run `operation`, dropping it with [`WorkflowError::Cancelled`] once `deadline` passes.
///
/// Dropping the operation kills any git or curl child it is waiting on and
/// releases its scratch working copy.
pub async fn with_deadline<T>(
    deadline: Option<Duration>,
    operation: impl Future<Output = Result<T, WorkflowError>>,
) -> Result<T, WorkflowError> {
    match deadline {
        None => operation.await,
        Some(after) => tokio::time::timeout(after, operation)
            .await
            .map_err(|_elapsed| WorkflowError::Cancelled { after })?,
    }
}
