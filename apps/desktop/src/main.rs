use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::InsightsClient;
use shared::domain::UserId;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod views;

#[derive(Parser, Debug)]
#[command(about = "Financial health summary and finance assistant chat")]
struct Args {
    /// Settings file; defaults to ./client.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Session token issued at sign-in, sent as the `session` cookie.
    #[arg(long, global = true)]
    session_token: Option<String>,
    #[arg(long, global = true)]
    user_id: Option<String>,
    /// Name to greet the user with.
    #[arg(long, global = true)]
    display_name: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the financial health summary.
    Diagnosis {
        /// Fetch a new summary even if one is cached.
        #[arg(long)]
        refresh: bool,
    },
    /// Chat with the finance assistant (`/clear` empties the transcript, `/quit` exits).
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(config::CONFIG_FILE));
    let mut settings = config::load_settings(&config_path);
    if let Some(v) = args.server_url {
        settings.server_url = v;
    }
    if let Some(v) = args.session_token {
        settings.session_token = Some(v);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = InsightsClient::connect(settings.connect_options())
        .with_context(|| format!("failed to configure client for '{}'", settings.server_url))?;
    info!(server_url = %settings.server_url, "insights client ready");

    let identity = args.user_id.as_deref().and_then(|raw| UserId::parse(raw).ok());
    client.observe(identity);
    let mut stdout = std::io::stdout();

    match args.command {
        Command::Diagnosis { refresh } => {
            let scope = client.diagnosis_scope();
            let name = args.display_name.as_deref();
            views::run_diagnosis(&scope, refresh, name, &mut stdout).await?;
        }
        Command::Chat => {
            let scope = client.chat_scope();
            let stdin = BufReader::new(tokio::io::stdin());
            views::run_chat(&scope, stdin, &mut stdout).await?;
        }
    }

    Ok(())
}
