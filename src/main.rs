use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use ghkit::App;
use ghkit::Config;
use ghkit::commands::app_token::cmd_app_token;
use ghkit::commands::benchtable;
use ghkit::commands::comment::CommentTarget;
use ghkit::commands::pull_request::parse_labels;
use ghkit::commands::push::ChangeArg;
use ghkit::commands::push::read_changes;
use ghkit::commands::sync_releases::DEFAULT_SYNC_INTERVAL;
use ghkit::config::DEFAULT_API_BASE_URL;
use ghkit::ops::git::RealGit;
use ghkit::ops::github::RealGithub;
use ghkit::types::Author;
use ghkit::types::BranchName;
use ghkit::types::CreateBranchRequest;
use ghkit::types::CreatePullRequestRequest;
use ghkit::types::RepoId;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "ghkit")]
#[command(about = "Small GitHub and git maintenance utilities", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Commit local files to a new branch and open a PR for it
    Push {
        owner: String,
        repo: String,
        /// Existing branch to start from; also the PR base
        #[arg(long, default_value = "main")]
        base: BranchName,
        /// New branch to create; must not exist yet
        #[arg(long)]
        branch: BranchName,
        #[arg(short, long)]
        message: String,
        #[arg(long, env = "GIT_AUTHOR_NAME")]
        author_name: String,
        #[arg(long, env = "GIT_AUTHOR_EMAIL")]
        author_email: String,
        /// PATH=LOCAL_FILE, repeatable
        #[arg(long = "change", required = true)]
        changes: Vec<ChangeArg>,
        /// PR title (defaults to the first line of the message)
        #[arg(long)]
        title: Option<String>,
        #[arg(long, default_value = "")]
        body: String,
        #[arg(long)]
        draft: bool,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Open a PR for an existing branch
    PullRequest {
        owner: String,
        repo: String,
        branch: BranchName,
        /// The branch into which the code should be merged
        #[arg(long, default_value = "master")]
        base: BranchName,
        /// PR title (defaults to the branch name)
        #[arg(long)]
        title: Option<String>,
        #[arg(long, default_value = "")]
        body: String,
        /// Comma separated labels to put on the PR, repeatable
        #[arg(long)]
        labels: Vec<String>,
        #[arg(long)]
        draft: bool,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Comment on an issue, PR or commit (revisions need 7 or more characters)
    Comment {
        owner: String,
        repo: String,
        /// Issue/PR number or commit revision
        target: String,
        #[arg(required = true)]
        body: Vec<String>,
    },
    /// Add labels to an issue or PR
    Label {
        owner: String,
        repo: String,
        number: u64,
        #[arg(required = true)]
        labels: Vec<String>,
    },
    /// Copy releases missing on DEST_OWNER/REPO from SRC_OWNER/REPO
    SyncReleases {
        repo: String,
        dest_owner: String,
        src_owner: String,
        /// Seconds to wait after each created release
        #[arg(long, default_value_t = DEFAULT_SYNC_INTERVAL.as_secs())]
        interval: u64,
    },
    /// Turn `go test -bench -benchmem` output into a markdown table
    Benchtable {
        /// Read from this file instead of stdin
        file: Option<PathBuf>,
    },
    /// Print an installation access token for a GitHub App
    AppToken {
        integration_id: u64,
        installation_id: u64,
        pem_path: PathBuf,
        #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_BASE_URL)]
        api_url: String,
    },
}

fn setup_logging() -> Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    tracing_subscriber::fmt()
        .with_timer(timer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn real_app() -> Result<App<RealGit, RealGithub>> {
    let config = Config::load()?;
    let gh = RealGithub::new(config.github_token.clone(), config.api_base_url.clone());
    Ok(App::new(config, RealGit, gh))
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();

    match cli.command {
        Commands::Push {
            owner,
            repo,
            base,
            branch,
            message,
            author_name,
            author_email,
            changes,
            title,
            body,
            draft,
            timeout,
        } => {
            let request = CreateBranchRequest {
                repo: RepoId::new(owner, repo),
                source: base,
                branch,
                message,
                author: Author::new(author_name, author_email),
                changes: read_changes(&changes).await?,
            };
            real_app()?
                .cmd_push(
                    &request,
                    title.as_deref(),
                    &body,
                    draft,
                    timeout.map(Duration::from_secs),
                    &mut stdout,
                )
                .await?
        }
        Commands::PullRequest {
            owner,
            repo,
            branch,
            base,
            title,
            body,
            labels,
            draft,
            timeout,
        } => {
            let request = CreatePullRequestRequest {
                repo: RepoId::new(owner, repo),
                title: title.unwrap_or_else(|| branch.to_string()),
                base,
                head: branch,
                body,
                draft,
            };
            real_app()?
                .cmd_pull_request(
                    &request,
                    &parse_labels(&labels),
                    timeout.map(Duration::from_secs),
                    &mut stdout,
                )
                .await?
        }
        Commands::Comment {
            owner,
            repo,
            target,
            body,
        } => {
            let target = CommentTarget::parse(&target)?;
            real_app()?
                .cmd_comment(&RepoId::new(owner, repo), &target, &body.join(" "), &mut stdout)
                .await?
        }
        Commands::Label {
            owner,
            repo,
            number,
            labels,
        } => {
            real_app()?
                .cmd_label(&RepoId::new(owner, repo), number, &labels, &mut stdout)
                .await?
        }
        Commands::SyncReleases {
            repo,
            dest_owner,
            src_owner,
            interval,
        } => {
            let src = RepoId::new(src_owner, repo.clone());
            let dest = RepoId::new(dest_owner, repo);
            real_app()?
                .cmd_sync_releases(&src, &dest, Duration::from_secs(interval), &mut stdout)
                .await?;
        }
        Commands::Benchtable { file } => match file {
            Some(path) => {
                let file = std::fs::File::open(&path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                benchtable::render(BufReader::new(file), &mut stdout)?
            }
            None => benchtable::render(std::io::stdin().lock(), &mut stdout)?,
        },
        Commands::AppToken {
            integration_id,
            installation_id,
            pem_path,
            api_url,
        } => {
            cmd_app_token(
                &api_url,
                integration_id,
                installation_id,
                &pem_path,
                &mut stdout,
            )
            .await?
        }
    }

    Ok(())
}
