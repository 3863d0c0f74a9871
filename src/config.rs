use anyhow::Context;
use anyhow::Result;

use crate::ops::git::GitAuth;

pub const DEFAULT_GIT_BASE_URL: &str = "https://github.com";
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Username sent with the token when `GITHUB_USER` is not set. GitHub accepts
/// any non-empty username for token authentication.
const DEFAULT_GIT_USERNAME: &str = "x-access-token";

#[derive(Clone)]
pub struct Config {
    pub github_token: String,
    pub git_auth: GitAuth,
    /// Repositories are cloned from `<git_base_url>/<owner>/<repo>`.
    pub git_base_url: String,
    pub api_base_url: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("github_token", &"<redacted>")
            .field("git_auth", &self.git_auth)
            .field("git_base_url", &self.git_base_url)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl Config {
    /// Load config from the process environment
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let github_token = lookup("GITHUB_TOKEN")
            .filter(|token| !token.is_empty())
            .context("You need a GitHub API token via the GITHUB_TOKEN env var")?;
        let username =
            lookup("GITHUB_USER").unwrap_or_else(|| DEFAULT_GIT_USERNAME.to_string());

        let mut config = Self::new(github_token);
        config.git_auth = GitAuth::Basic {
            username,
            password: config.github_token.clone(),
        };
        if let Some(url) = lookup("GITHUB_URL") {
            config.git_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup("GITHUB_API_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        Ok(config)
    }

    /// Create a new config with explicit values (useful for tests)
    pub fn new(github_token: String) -> Self {
        Self {
            git_auth: GitAuth::Basic {
                username: DEFAULT_GIT_USERNAME.to_string(),
                password: github_token.clone(),
            },
            github_token,
            git_base_url: DEFAULT_GIT_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    /// Default config for tests
    pub fn default_for_tests() -> Self {
        Self {
            github_token: "test-token".to_string(),
            git_auth: GitAuth::Anonymous,
            git_base_url: "https://github.test".to_string(),
            api_base_url: "https://api.github.test".to_string(),
        }
    }
}
