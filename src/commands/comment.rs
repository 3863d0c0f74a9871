use std::fmt::Display;

use anyhow::Context;
use anyhow::Result;
use log::debug;
use log::info;

use crate::App;
use crate::ops::github::GithubOps;
use crate::types::RepoId;

/// GitHub shows commits by 7 character abbreviated hashes, so anything at
/// least that long is taken as a revision.
const MIN_REVISION_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentTarget {
    Issue(u64),
    Commit(String),
}

impl CommentTarget {
    pub fn parse(target: &str) -> Result<Self> {
        if target.len() >= MIN_REVISION_LEN {
            return Ok(Self::Commit(target.to_string()));
        }
        let number = target
            .parse()
            .with_context(|| format!("Issue number must be an integer, got {:?}", target))?;
        Ok(Self::Issue(number))
    }

    fn path(&self) -> String {
        match self {
            Self::Issue(number) => format!("issues/{}", number),
            Self::Commit(revision) => format!("commit/{}", revision),
        }
    }
}

impl Display for CommentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Issue(number) => write!(f, "#{}", number),
            Self::Commit(revision) => f.write_str(revision),
        }
    }
}

impl<G, H: GithubOps> App<G, H> {
    /// Comment on an issue, pull request or commit, unless the exact same
    /// comment is already there.
    pub async fn cmd_comment(
        &self,
        repo: &RepoId,
        target: &CommentTarget,
        body: &str,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let existing = match target {
            CommentTarget::Issue(number) => self.gh.list_issue_comments(repo, *number).await,
            CommentTarget::Commit(revision) => self.gh.list_commit_comments(repo, revision).await,
        }
        .with_context(|| format!("Failed to get comments on {} in {}", target, repo))?;

        if existing.iter().any(|comment| comment.body == body) {
            info!("Comment {:?} was already posted, skipping", body);
            return Ok(());
        }

        let url = format!("{}/{}", self.remote_url(repo), target.path());
        info!("Creating a comment {:?} on {}", body, url);
        let created = match target {
            CommentTarget::Issue(number) => self.gh.create_issue_comment(repo, *number, body).await,
            CommentTarget::Commit(revision) => {
                self.gh.create_commit_comment(repo, revision, body).await
            }
        }
        .context("Failed to create comment")?;
        debug!("Created comment {}", created.id);

        writeln!(stdout, "Commented on {}", url)?;
        Ok(())
    }
}
