use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Component;
use std::path::Path;

use anyhow::bail;

// -----------------------------------------------------------------------------
// Repository identity

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Identity recorded as both author and committer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

// -----------------------------------------------------------------------------
// BranchName

/// A branch name that git accepts as `refs/heads/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchName(String);

impl BranchName {
    pub fn new(name: impl Into<String>) -> anyhow::Result<Self> {
        let name = name.into();
        validate_ref_name(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for BranchName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Rules of `git check-ref-format --branch`.
fn validate_ref_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() {
        bail!("branch name is empty");
    }
    if name == "@" {
        bail!("'@' is not a valid branch name");
    }
    if name.starts_with('-') {
        bail!("branch name '{name}' starts with '-'");
    }
    if name.starts_with('/') || name.ends_with('/') {
        bail!("branch name '{name}' starts or ends with '/'");
    }
    if name.ends_with('.') {
        bail!("branch name '{name}' ends with '.'");
    }
    for pattern in ["//", "..", "@{"] {
        if name.contains(pattern) {
            bail!("branch name '{name}' contains '{pattern}'");
        }
    }
    if let Some(c) = name
        .chars()
        .find(|c| c.is_ascii_control() || matches!(*c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
    {
        bail!("branch name '{name}' contains forbidden character {c:?}");
    }
    for component in name.split('/') {
        if component.starts_with('.') {
            bail!("branch name '{name}' has a component starting with '.'");
        }
        if component.ends_with(".lock") {
            bail!("branch name '{name}' has a component ending with '.lock'");
        }
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Requests and results

/// Everything needed to put one new commit on a new remote branch.
#[derive(Debug, Clone)]
pub struct CreateBranchRequest {
    pub repo: RepoId,
    /// Existing branch the new branch starts from.
    pub source: BranchName,
    pub branch: BranchName,
    pub message: String,
    pub author: Author,
    /// Relative path to new file content.
    pub changes: BTreeMap<String, Vec<u8>>,
}

impl CreateBranchRequest {
    pub fn with_change(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.changes.insert(path.into(), content.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CreatePullRequestRequest {
    pub repo: RepoId,
    pub base: BranchName,
    pub head: BranchName,
    pub title: String,
    pub body: String,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestCreated {
    pub number: u64,
    pub html_url: String,
}

/// Check that a change path stays inside the working copy and away from `.git`.
pub fn validate_change_path(path: &str) -> anyhow::Result<()> {
    if path.is_empty() {
        bail!("change path is empty");
    }
    if path.contains('\\') {
        bail!("change path '{path}' must use '/' separators");
    }
    let mut components = Path::new(path).components().peekable();
    if let Some(Component::Normal(first)) = components.peek() {
        if *first == ".git" {
            bail!("change path '{path}' points into .git");
        }
    }
    for component in components {
        match component {
            Component::Normal(_) => {}
            Component::CurDir | Component::ParentDir => {
                bail!("change path '{path}' contains '.' or '..'")
            }
            Component::RootDir | Component::Prefix(_) => {
                bail!("change path '{path}' is not relative")
            }
        }
    }
    if path.ends_with('/') {
        bail!("change path '{path}' names a directory");
    }
    Ok(())
}
