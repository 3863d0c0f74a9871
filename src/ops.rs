//! Integration layers for the two remote systems `ghkit` drives.
//!
//! - [`git`]: Working-copy operations (shallow clone, branch, stage, commit, push) via the git CLI
//! - [`github`]: GitHub REST operations (pull requests, comments, labels, releases)
//! - [`github_curl`]: Curl-based HTTP client for making GitHub API requests
//!
//! `git` and `github` expose traits with real and mock implementations
//! to support both production use and testing.

pub mod git;
pub mod github;
pub mod github_curl;
