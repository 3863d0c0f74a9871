use anyhow::Context;
use anyhow::Result;
use anyhow::ensure;
use log::info;

use crate::App;
use crate::ops::github::GithubOps;
use crate::types::RepoId;

impl<G, H: GithubOps> App<G, H> {
    pub async fn cmd_label(
        &self,
        repo: &RepoId,
        number: u64,
        labels: &[String],
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        ensure!(!labels.is_empty(), "At least one label is required");

        let url = format!("{}/issues/{}", self.remote_url(repo), number);
        info!("Adding labels on {}", url);
        self.gh
            .add_labels(repo, number, labels)
            .await
            .context("Failed to add labels")?;

        writeln!(stdout, "Labeled {} with {}", url, labels.join(", "))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use crate::ops::github::MockGithubOps;

    #[tokio::test]
    async fn test_label_issue() -> Result<()> {
        let mut mock_gh = MockGithubOps::new();
        mock_gh
            .expect_add_labels()
            .withf(|_, number, labels| *number == 12 && labels == ["bug", "help wanted"])
            .times(1)
            .returning(|_, _, _| Ok(()));

        let app = App::new(Config::default_for_tests(), (), mock_gh);
        let mut out = Vec::new();
        app.cmd_label(
            &RepoId::new("acme", "widgets"),
            12,
            &["bug".to_string(), "help wanted".to_string()],
            &mut out,
        )
        .await?;

        insta::assert_snapshot!(String::from_utf8(out)?, @"Labeled https://github.test/acme/widgets/issues/12 with bug, help wanted");
        Ok(())
    }

    #[tokio::test]
    async fn test_label_requires_labels() {
        let mut mock_gh = MockGithubOps::new();
        mock_gh.expect_add_labels().never();

        let app = App::new(Config::default_for_tests(), (), mock_gh);
        let err = app
            .cmd_label(&RepoId::new("acme", "widgets"), 12, &[], &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("label"));
    }
}
