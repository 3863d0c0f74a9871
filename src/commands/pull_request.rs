use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use colored::Colorize;
use log::info;

use crate::App;
use crate::app::with_deadline;
use crate::ops::github::GithubOps;
use crate::types::CreatePullRequestRequest;

/// Split comma separated label lists, dropping blanks and repeats while
/// keeping the first-seen order.
pub fn parse_labels<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for value in values {
        for label in value.as_ref().split(',').map(str::trim) {
            if !label.is_empty() && !labels.iter().any(|l| l == label) {
                labels.push(label.to_string());
            }
        }
    }
    labels
}

impl<G, H: GithubOps> App<G, H> {
    /// Open a pull request for an existing branch, then label it.
    pub async fn cmd_pull_request(
        &self,
        request: &CreatePullRequestRequest,
        labels: &[String],
        deadline: Option<Duration>,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let pr = with_deadline(deadline, self.create_pull_request(request)).await?;
        writeln!(stdout, "Created PR: {}", pr.html_url.cyan())?;

        if !labels.is_empty() {
            self.gh
                .add_labels(&request.repo, pr.number, labels)
                .await
                .with_context(|| format!("Failed to add labels to {}", pr.html_url))?;
            info!("Added labels {}", labels.join(", "));
        }
        Ok(())
    }
}
