// Entrypoint for the retention cleanup tool.
// Authenticates, lists the repository root and deletes every file older than
// `--maxage`. Per-file failures are logged and do not change the exit code.

use anyhow::{Context, Result};
use clap::Parser;
use seafile_tools::cleanup;
use seafile_tools::config::{CleanupArgs, Config, ConnectionArgs, FileConfig};
use seafile_tools::{ui, ApiClient};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Delete Seafile files older than a maximum age", long_about = None)]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(flatten)]
    cleanup: CleanupArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seafile_tools=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let file_config = FileConfig::discover(args.connection.config.as_deref())?;
    let config = Config::resolve(&args.connection, &file_config);
    for setting in config.placeholders() {
        warn!("{setting} is still the placeholder default");
    }
    let policy = args.cleanup.policy(&file_config)?;

    let password = ui::resolve_password(&config)?;
    let mut client = ApiClient::from_config(&config)?;
    client
        .authenticate(&config.username, &password)
        .await
        .context("unable to fetch seafile token")?;

    info!(max_age = %policy.max_age, repo = %config.repo_id, "starting cleanup");
    let report = cleanup::run_cleanup(Arc::new(client), &policy)
        .await
        .context("unable to list directory entries")?;

    info!(%report, "cleanup finished");
    println!("{report}");
    Ok(())
}
