//! cargo test --test workflow -- --nocapture
//!
//! Drives the branch workflow with the real git binary against a bare
//! repository served over `file://`.

mod utils;

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

use ghkit::App;
use ghkit::Config;
use ghkit::ErrorKind;
use ghkit::error::ReferenceError;
use ghkit::ops::git::GitAuth;
use ghkit::ops::git::RealGit;
use ghkit::types::Author;
use ghkit::types::BranchName;
use ghkit::types::CreateBranchRequest;
use ghkit::types::RepoId;

// Normalize IDs etc.
static INSTA_FILTERS: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    vec![
        // Git object ID
        (r"\b[0-9a-f]{40}\b", "[OBJID]"),
    ]
});

#[ctor::ctor]
fn init() {
    colored::control::set_override(false);
    utils::setup_logging().unwrap();
}

struct Fixture {
    dir: utils::TestDir,
    remote: PathBuf,
    app: App<RealGit, ()>,
}

async fn setup() -> anyhow::Result<Fixture> {
    let dir = utils::TestDir::new()?;
    let remote = utils::create_remote(dir.path(), "acme", "widgets").await?;

    let config = Config {
        git_auth: GitAuth::Anonymous,
        git_base_url: format!("file://{}", dir.path().display()),
        ..Config::default_for_tests()
    };
    Ok(Fixture {
        dir,
        remote,
        app: App::new(config, RealGit, ()),
    })
}

fn request(branch: &str) -> CreateBranchRequest {
    CreateBranchRequest {
        repo: RepoId::new("acme", "widgets"),
        source: BranchName::new("main").unwrap(),
        branch: BranchName::new(branch).unwrap(),
        message: "Update docs".to_string(),
        author: Author::new("Docs Bot", "docs-bot@acme.test"),
        changes: BTreeMap::new(),
    }
}

async fn show(remote: &Path, object: &str) -> anyhow::Result<String> {
    utils::git_output(remote, &["show", object]).await
}

#[tokio::test]
async fn test_create_branch_pushes_one_commit() -> anyhow::Result<()> {
    let fx = setup().await?;
    let main_before = utils::git_output(&fx.remote, &["rev-parse", "main"]).await?;

    let request = request("bot/update-docs")
        .with_change("README.md", "hello")
        .with_change("docs/guide/intro.md", "# Intro\n");
    fx.app.create_branch(&request).await?;

    // Exactly one new commit whose parent is the source tip
    let parent = utils::git_output(&fx.remote, &["rev-parse", "bot/update-docs^"]).await?;
    assert_eq!(parent, main_before);
    let main_after = utils::git_output(&fx.remote, &["rev-parse", "main"]).await?;
    assert_eq!(main_after, main_before, "source branch must not move");

    let log = utils::git_output(
        &fx.remote,
        &["log", "--format=%H %s (%an <%ae>, committer %cn)", "main..bot/update-docs"],
    )
    .await?;
    assert_snapshot_filtered!(log, INSTA_FILTERS, @"[OBJID] Update docs (Docs Bot <docs-bot@acme.test>, committer Docs Bot)");

    let names = utils::git_output(
        &fx.remote,
        &["diff", "--name-only", "main", "bot/update-docs"],
    )
    .await?;
    insta::assert_snapshot!(names, @r"
    README.md
    docs/guide/intro.md
    ");

    assert_eq!(show(&fx.remote, "bot/update-docs:README.md").await?, "hello");
    assert_eq!(
        show(&fx.remote, "bot/update-docs:docs/guide/intro.md").await?,
        "# Intro"
    );
    Ok(())
}

#[tokio::test]
async fn test_create_branch_twice_fails_with_branch_exists() -> anyhow::Result<()> {
    let fx = setup().await?;
    let request = request("bot/once").with_change("README.md", "hello");
    fx.app.create_branch(&request).await?;
    let tip = utils::git_output(&fx.remote, &["rev-parse", "bot/once"]).await?;

    let again = request.with_change("README.md", "hello again");
    let err = fx.app.create_branch(&again).await.unwrap_err();
    assert_eq!(
        err.reference_reason(),
        Some(&ReferenceError::BranchExists {
            branch: "bot/once".to_string(),
            detail: None,
        })
    );

    // The existing branch is left alone
    let tip_after = utils::git_output(&fx.remote, &["rev-parse", "bot/once"]).await?;
    assert_eq!(tip_after, tip);
    Ok(())
}

#[tokio::test]
async fn test_create_branch_missing_source() -> anyhow::Result<()> {
    let fx = setup().await?;
    let mut request = request("bot/from-nowhere").with_change("README.md", "hello");
    request.source = BranchName::new("does-not-exist")?;

    let err = fx.app.create_branch(&request).await.unwrap_err();
    assert_eq!(
        err.reference_reason(),
        Some(&ReferenceError::SourceMissing("does-not-exist".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn test_create_branch_empty_change_set() -> anyhow::Result<()> {
    let fx = setup().await?;

    let err = fx.app.create_branch(&request("bot/empty")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let branches = utils::git_output(&fx.remote, &["branch", "--list", "bot/*"]).await?;
    assert!(branches.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_create_branch_unchanged_content_is_nothing_to_commit() -> anyhow::Result<()> {
    let fx = setup().await?;
    let request = request("bot/noop").with_change("README.md", "initial\n");

    let err = fx.app.create_branch(&request).await.unwrap_err();
    assert_eq!(err.reference_reason(), Some(&ReferenceError::NothingToCommit));

    let branches = utils::git_output(&fx.remote, &["branch", "--list", "bot/*"]).await?;
    assert!(branches.is_empty(), "nothing should be pushed");
    Ok(())
}

#[tokio::test]
async fn test_create_branch_unreachable_remote_is_transport_error() -> anyhow::Result<()> {
    let fx = setup().await?;
    let mut request = request("bot/elsewhere").with_change("README.md", "hello");
    request.repo = RepoId::new("acme", "missing-repo");

    let err = fx.app.create_branch(&request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().starts_with("clone failed for acme/missing-repo"));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_create_branch_hook_rejection_is_transport_error() -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let fx = setup().await?;
    let hook = fx.remote.join("hooks").join("pre-receive");
    tokio::fs::create_dir_all(fx.remote.join("hooks")).await?;
    tokio::fs::write(&hook, "#!/bin/sh\necho \"permission denied for bot\" >&2\nexit 1\n").await?;
    tokio::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).await?;

    let request = request("bot/guarded").with_change("README.md", "hello");
    let err = fx.app.create_branch(&request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().starts_with("push failed for acme/widgets"));
    assert!(err.to_string().contains("permission denied for bot"), "{err}");

    let branches = utils::git_output(&fx.remote, &["branch", "--list", "bot/*"]).await?;
    assert!(branches.is_empty());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_create_branch_does_not_follow_committed_symlinks() -> anyhow::Result<()> {
    let fx = setup().await?;
    let outside = fx.dir.path().join("outside");
    tokio::fs::create_dir_all(&outside).await?;
    let victim = outside.join("victim.txt");
    tokio::fs::write(&victim, "untouched\n").await?;

    // Commit links pointing out of the working copy onto the remote's main
    let seed = fx.dir.path().join("seed");
    tokio::fs::symlink(&victim, seed.join("link")).await?;
    tokio::fs::symlink(&outside, seed.join("dirlink")).await?;
    utils::git(&seed, &["add", "--all"]).await?;
    utils::git(&seed, &["commit", "-m", "Add links"]).await?;
    utils::git(&seed, &["push", &fx.remote.to_string_lossy(), "main"]).await?;

    for (branch, path) in [("bot/link", "link"), ("bot/dirlink", "dirlink/planted.txt")] {
        let request = request(branch).with_change(path, "overwritten");
        let err = fx.app.create_branch(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocalWrite, "{path}: {err}");
    }

    assert_eq!(tokio::fs::read_to_string(&victim).await?, "untouched\n");
    assert!(!outside.join("planted.txt").exists());
    let branches = utils::git_output(&fx.remote, &["branch", "--list", "bot/*"]).await?;
    assert!(branches.is_empty());
    Ok(())
}
