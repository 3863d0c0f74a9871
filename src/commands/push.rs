use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use colored::Colorize;
use log::warn;

use crate::App;
use crate::app::with_deadline;
use crate::ops::git::GitOps;
use crate::ops::github::GithubOps;
use crate::types::CreateBranchRequest;

/// One `--change PATH=LOCAL_FILE` argument: put the content of `local` at
/// `path` in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeArg {
    pub path: String,
    pub local: PathBuf,
}

impl std::str::FromStr for ChangeArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((path, local)) = s.split_once('=') else {
            bail!("Expected PATH=LOCAL_FILE, got {:?}", s);
        };
        if path.is_empty() || local.is_empty() {
            bail!("Expected PATH=LOCAL_FILE, got {:?}", s);
        }
        Ok(Self {
            path: path.to_string(),
            local: PathBuf::from(local),
        })
    }
}

/// Read every local file into a change set keyed by repository path.
pub async fn read_changes(args: &[ChangeArg]) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut changes = BTreeMap::new();
    for arg in args {
        let content = tokio::fs::read(&arg.local)
            .await
            .with_context(|| format!("Failed to read {}", arg.local.display()))?;
        if changes.insert(arg.path.clone(), content).is_some() {
            bail!("Path {} is given more than once", arg.path);
        }
    }
    Ok(changes)
}

impl<G: GitOps, H: GithubOps> App<G, H> {
    /// Push the change set to a new branch and open a pull request for it.
    ///
    /// The title defaults to the first line of the commit message.
    pub async fn cmd_push(
        &self,
        request: &CreateBranchRequest,
        title: Option<&str>,
        body: &str,
        draft: bool,
        deadline: Option<Duration>,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let title = match title {
            Some(title) => title,
            None => request.message.lines().next().unwrap_or_default(),
        };
        let pr = match with_deadline(deadline, self.open_pull_request(request, title, body, draft))
            .await
        {
            Ok(pr) => pr,
            Err(err) => {
                if err.remote_may_be_mutated() {
                    warn!(
                        "Branch {} may have been left on {}, delete it before retrying",
                        request.branch, request.repo
                    );
                }
                return Err(err.into());
            }
        };
        writeln!(stdout, "Created PR: {}", pr.html_url.cyan())?;
        Ok(())
    }
}
