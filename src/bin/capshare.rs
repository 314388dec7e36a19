// Entrypoint for the capture-and-share tool.
// - Uploads the given file, or a fresh screen capture when none is given.
// - Shares it, prints the link and copies it to the clipboard.
// - Any failure is printed, sent as a desktop notification and exits 1.

use anyhow::{Context, Result};
use clap::Parser;
use seafile_tools::api::ShareLink;
use seafile_tools::config::{Config, ConnectionArgs, FileConfig};
use seafile_tools::desktop::{self, ScreenCapture};
use seafile_tools::{share, ui, ApiClient};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload a file or screen capture to Seafile and copy its share link", long_about = None)]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Print the link without copying it to the clipboard
    #[arg(long)]
    no_clipboard: bool,

    /// File to upload; a screen region is captured when omitted
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seafile_tools=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(args).await {
        let msg = format!("{e:#}");
        desktop::notify(&msg);
        eprintln!("{msg}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let file_config = FileConfig::discover(args.connection.config.as_deref())?;
    let config = Config::resolve(&args.connection, &file_config);
    for setting in config.placeholders() {
        warn!("{setting} is still the placeholder default");
    }

    // Held until the end of `run` so the capture file outlives the upload.
    let capture = match &args.file {
        Some(_) => None,
        None => {
            let mut needed = vec!["import"];
            if !args.no_clipboard {
                needed.push("xclip");
            }
            let missing = desktop::missing_tools(&needed);
            if !missing.is_empty() {
                anyhow::bail!("{} need to be installed and available in $PATH", missing.join(" and "));
            }
            let capture = ScreenCapture::new();
            capture.capture().context("image capture aborted")?;
            Some(capture)
        }
    };
    let path = args
        .file
        .clone()
        .or_else(|| capture.as_ref().map(|c| c.path().to_path_buf()))
        .context("nothing to upload")?;

    let password = ui::resolve_password(&config)?;
    let mut client = ApiClient::from_config(&config)?;

    let spinner = ui::spinner("Authenticating...");
    let shared: Result<ShareLink> = async {
        client
            .authenticate(&config.username, &password)
            .await
            .context("unable to fetch seafile token")?;
        spinner.set_message("Uploading...");
        share::upload_and_share(&client, &path)
            .await
            .with_context(|| format!("unable to upload and share {}", path.display()))
    }
    .await;
    spinner.finish_and_clear();
    let share = shared?;

    println!("{}", share.link);
    if !args.no_clipboard {
        desktop::copy_to_clipboard(&share.link)?;
        desktop::notify("uploaded file and copied link to clipboard!");
    }
    Ok(())
}
