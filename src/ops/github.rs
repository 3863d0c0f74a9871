#![allow(async_fn_in_trait)]

#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use super::github_curl::ApiError;
use super::github_curl::GithubCurlClient;
use crate::types::RepoId;

/// Page size used for list endpoints; GitHub caps it at 100.
const PER_PAGE: usize = 100;

// -----------------------------------------------------------------------------
// GithubOps trait

/// Operations for interacting with GitHub
#[cfg_attr(test, automock)]
pub trait GithubOps {
    async fn create_pull_request(
        &self,
        repo: &RepoId,
        request: &NewPullRequest,
    ) -> Result<PullRequest, ApiError>;

    /// All comments on an issue or pull request.
    async fn list_issue_comments(&self, repo: &RepoId, number: u64)
    -> Result<Vec<Comment>, ApiError>;

    async fn create_issue_comment(
        &self,
        repo: &RepoId,
        number: u64,
        body: &str,
    ) -> Result<Comment, ApiError>;

    /// All comments on a commit.
    async fn list_commit_comments(
        &self,
        repo: &RepoId,
        revision: &str,
    ) -> Result<Vec<Comment>, ApiError>;

    async fn create_commit_comment(
        &self,
        repo: &RepoId,
        revision: &str,
        body: &str,
    ) -> Result<Comment, ApiError>;

    async fn add_labels(
        &self,
        repo: &RepoId,
        number: u64,
        labels: &[String],
    ) -> Result<(), ApiError>;

    /// All releases, newest first.
    async fn list_releases(&self, repo: &RepoId) -> Result<Vec<Release>, ApiError>;

    async fn create_release(&self, repo: &RepoId, release: &NewRelease)
    -> Result<Release, ApiError>;
}

// -----------------------------------------------------------------------------
// Types

#[derive(Debug, Clone, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
    pub draft: bool,
    pub maintainer_can_modify: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewRelease {
    pub tag_name: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct LabelsBody<'a> {
    labels: &'a [String],
}

// -----------------------------------------------------------------------------
// RealGithub

/// Real implementation backed by the GitHub REST API
pub struct RealGithub {
    http_client: GithubCurlClient,
}

impl RealGithub {
    pub fn new(token: String, api_base_url: String) -> Self {
        Self {
            http_client: GithubCurlClient::new(token, api_base_url),
        }
    }

    /// Follow `page=N` until a page comes back short.
    async fn get_all_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        for page in 1.. {
            let url = self
                .http_client
                .url(&format!("{}?per_page={}&page={}", path, PER_PAGE, page));
            let response = self.http_client.get(&url).await?;
            let batch: Vec<T> = serde_json::from_str(&response)?;
            let done = batch.len() < PER_PAGE;
            items.extend(batch);
            if done {
                break;
            }
        }
        Ok(items)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.http_client.url(path);
        let json_data = serde_json::to_string(body)?;
        let response = self.http_client.post(&url, &json_data).await?;
        Ok(serde_json::from_str(&response)?)
    }
}

impl GithubOps for RealGithub {
    #[instrument(skip_all, fields(repo = %repo, head = %request.head, base = %request.base))]
    async fn create_pull_request(
        &self,
        repo: &RepoId,
        request: &NewPullRequest,
    ) -> Result<PullRequest, ApiError> {
        self.post_json(&format!("/repos/{}/{}/pulls", repo.owner, repo.repo), request)
            .await
    }

    #[instrument(skip_all, fields(repo = %repo, number = number))]
    async fn list_issue_comments(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<Vec<Comment>, ApiError> {
        self.get_all_pages(&format!(
            "/repos/{}/{}/issues/{}/comments",
            repo.owner, repo.repo, number
        ))
        .await
    }

    #[instrument(skip_all, fields(repo = %repo, number = number))]
    async fn create_issue_comment(
        &self,
        repo: &RepoId,
        number: u64,
        body: &str,
    ) -> Result<Comment, ApiError> {
        self.post_json(
            &format!("/repos/{}/{}/issues/{}/comments", repo.owner, repo.repo, number),
            &CommentBody { body },
        )
        .await
    }

    #[instrument(skip_all, fields(repo = %repo, revision = revision))]
    async fn list_commit_comments(
        &self,
        repo: &RepoId,
        revision: &str,
    ) -> Result<Vec<Comment>, ApiError> {
        self.get_all_pages(&format!(
            "/repos/{}/{}/commits/{}/comments",
            repo.owner, repo.repo, revision
        ))
        .await
    }

    #[instrument(skip_all, fields(repo = %repo, revision = revision))]
    async fn create_commit_comment(
        &self,
        repo: &RepoId,
        revision: &str,
        body: &str,
    ) -> Result<Comment, ApiError> {
        self.post_json(
            &format!("/repos/{}/{}/commits/{}/comments", repo.owner, repo.repo, revision),
            &CommentBody { body },
        )
        .await
    }

    #[instrument(skip_all, fields(repo = %repo, number = number))]
    async fn add_labels(
        &self,
        repo: &RepoId,
        number: u64,
        labels: &[String],
    ) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post_json(
                &format!("/repos/{}/{}/issues/{}/labels", repo.owner, repo.repo, number),
                &LabelsBody { labels },
            )
            .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(repo = %repo))]
    async fn list_releases(&self, repo: &RepoId) -> Result<Vec<Release>, ApiError> {
        self.get_all_pages(&format!("/repos/{}/{}/releases", repo.owner, repo.repo))
            .await
    }

    #[instrument(skip_all, fields(repo = %repo, tag = %release.tag_name))]
    async fn create_release(
        &self,
        repo: &RepoId,
        release: &NewRelease,
    ) -> Result<Release, ApiError> {
        self.post_json(&format!("/repos/{}/{}/releases", repo.owner, repo.repo), release)
            .await
    }
}
