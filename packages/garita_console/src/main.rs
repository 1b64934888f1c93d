use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use garita_stream::{SseConnector, StreamConnector};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use garita_console::api::{ConsoleApi, RestClient};
use garita_console::config::Config;
use garita_console::credentials;
use garita_console::ConsoleAgent;

#[derive(Parser)]
#[command(name = "garita")]
#[command(about = "Headless console agent for the garita access-control server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Custom data directory (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent in the foreground
    Run,

    /// Show configuration and credential status
    Status,

    /// Store the access token used for the streams and REST calls
    Login { token: String },

    /// Remove the stored token
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "garita=info,garita_console=info,garita_stream=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.data_dir)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Status => status(&config),
        Commands::Login { token } => {
            credentials::store_token(&config.token_path(), &token)?;
            println!("token stored in {}", config.token_path().display());
            Ok(())
        }
        Commands::Logout => {
            credentials::clear_token(&config.token_path())?;
            println!("token removed");
            Ok(())
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let token = credentials::read_token(&config.token_path());
    if token.is_none() {
        warn!("no credential stored; staying offline until `garita login <token>`");
    }

    let api: Arc<dyn ConsoleApi> = Arc::new(RestClient::new(&config.base_url, token.clone()));
    let connector: Arc<dyn StreamConnector> = Arc::new(SseConnector::new());
    let agent = ConsoleAgent::new(&config, api, connector);
    agent.start(token.as_deref()).await;

    info!(
        inbox = agent.inbox().unread().await,
        company = ?agent.company().active().await.map(|e| e.nombre),
        "garita agent running, ctrl-c to stop"
    );
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;

    agent.shutdown();
    info!("garita agent stopped");
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let token = credentials::read_token(&config.token_path());
    println!("base url:   {}", config.base_url);
    println!("data dir:   {}", config.data_dir.display());
    println!(
        "credential: {}",
        if token.is_some() { "present" } else { "absent" }
    );
    Ok(())
}
