//! Git Tracker - commit activity across your git repositories
//!
//! # Usage
//! ```bash
//! git-tracker parse git@github.com:me/tool          # Show remote user and name
//! git-tracker --manifest accounts.json refresh       # One refresh pass
//! git-tracker --manifest accounts.json activity --account 1 --tag Rust
//! git-tracker --manifest accounts.json serve         # Refresh every 2 hours
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use git_tracker::registry::{Manifest, Registry};
use git_tracker::scheduler::Refresher;
use git_tracker::store::StateStore;
use git_tracker::{ActivitySummary, Aggregate, DayBucketing, RepositoryKind, RepositoryLocation, TrackerConfig};

/// Git Tracker - commit activity across your git repositories
#[derive(Parser)]
#[command(name = "git-tracker")]
#[command(about = "Tracks git repositories and charts commit activity", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON manifest of accounts and their repositories
    #[arg(short, long, global = true, default_value = "accounts.json")]
    manifest: PathBuf,

    /// Directory holding the bare clones
    #[arg(short, long, global = true, default_value = "repositories")]
    root: PathBuf,

    /// Hours between scheduled refreshes
    #[arg(long, global = true, default_value = "2")]
    interval_hours: u64,

    /// Repositories refreshed at once
    #[arg(short, long, global = true, default_value = "4")]
    workers: usize,

    /// Seconds before a clone or fetch is abandoned (0 = never)
    #[arg(long, global = true, default_value = "600")]
    fetch_timeout: u64,

    /// Seconds to wait for a connection to a remote (0 = never give up)
    #[arg(long, global = true, default_value = "30")]
    connect_timeout: u64,

    /// Seconds a remote may go silent mid-transfer (0 = never give up)
    #[arg(long, global = true, default_value = "300")]
    stall_timeout: u64,

    /// Follow upstream history rewrites instead of refusing them
    #[arg(long, global = true)]
    follow_rewrites: bool,

    /// Bucket commits by this UTC offset in seconds instead of local time
    #[arg(long, global = true, allow_hyphen_values = true)]
    utc_offset: Option<i32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a remote location is parsed
    Parse { location: String },
    /// Refresh every tracked repository once
    Refresh,
    /// Print first/last update and histogram as JSON
    Activity {
        #[arg(long)]
        account: u64,
        /// Restrict to repositories carrying this tag
        #[arg(long, conflicts_with = "repository")]
        tag: Option<String>,
        /// Restrict to one repository (`<account-id>/<name>.git`)
        #[arg(long)]
        repository: Option<String>,
        #[arg(long)]
        start: Option<i64>,
        #[arg(long)]
        end: Option<i64>,
    },
    /// Refresh on a fixed interval until Ctrl+C
    Serve,
}

impl Cli {
    fn config(&self) -> anyhow::Result<TrackerConfig> {
        let bucketing = match self.utc_offset {
            Some(secs) => DayBucketing::from_offset_secs(secs)
                .with_context(|| format!("UTC offset out of range: {}", secs))?,
            None => DayBucketing::Local,
        };

        Ok(TrackerConfig {
            repo_root: self.root.clone(),
            refresh_interval: Duration::from_secs(self.interval_hours.max(1) * 60 * 60),
            workers: self.workers,
            fetch_timeout: seconds(self.fetch_timeout),
            connect_timeout: seconds(self.connect_timeout),
            stall_timeout: seconds(self.stall_timeout),
            follow_rewrites: self.follow_rewrites,
            bucketing,
            ..TrackerConfig::default()
        })
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(cli.config()?);
    // SAFETY: no thread has been spawned yet; the runtime starts below.
    unsafe { git_tracker::git::remote::apply_network_timeouts(&config)? };

    tokio::runtime::Runtime::new()?.block_on(run(cli, config))
}

async fn run(cli: Cli, config: Arc<TrackerConfig>) -> anyhow::Result<()> {
    let command = match cli.command {
        Commands::Parse { location } => {
            let parsed = RepositoryLocation::parse(&location);
            println!("user: {}", parsed.remote_user);
            println!("name: {}", parsed.repo_name);
            println!("kind: {}", kind_label(RepositoryKind::detect(&location)));
            return Ok(());
        }
        command => command,
    };

    let state = Arc::new(StateStore::open(config.repo_root.join("state.json"))?);
    let manifest = Manifest::load(&cli.manifest)
        .with_context(|| format!("Failed to read manifest {}", cli.manifest.display()))?;

    let registry = {
        let config = Arc::clone(&config);
        let state = Arc::clone(&state);
        tokio::task::spawn_blocking(move || Registry::build(&manifest, config, state.as_ref())).await?
    };
    let registry = Arc::new(registry);

    match command {
        Commands::Parse { .. } => {}
        Commands::Refresh => {
            let refresher = Refresher::new(Arc::clone(&config), registry, state);
            if let Some(report) = refresher.refresh_all().await {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Commands::Activity {
            account,
            tag,
            repository,
            start,
            end,
        } => {
            let handles = match (&tag, &repository) {
                (Some(tag), _) => registry.tagged(account, tag),
                (None, Some(id)) => registry.find(id).into_iter().collect(),
                (None, None) => registry.for_account(account),
            };
            let bucketing = config.bucketing;
            let summary = tokio::task::spawn_blocking(move || {
                let aggregate = Aggregate::new(&handles, bucketing);
                ActivitySummary::compute(&aggregate, start, end)
            })
            .await??;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Serve => {
            let refresher = Arc::new(Refresher::new(Arc::clone(&config), registry, state));
            println!();
            println!("  Git Tracker");
            println!("  Repositories: {}", config.repo_root.display());
            println!("  Interval:     {:?}", config.refresh_interval);
            println!("  Press Ctrl+C to stop");
            println!();

            refresher
                .run(async {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for Ctrl+C: {}", err);
                        std::future::pending::<()>().await;
                    }
                })
                .await;
        }
    }

    Ok(())
}

fn kind_label(kind: RepositoryKind) -> &'static str {
    match kind {
        RepositoryKind::Github => "github",
        RepositoryKind::Bitbucket => "bitbucket",
        RepositoryKind::Local => "local",
    }
}
