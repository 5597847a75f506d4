// Standalone MCP server binary

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use xbridge_core::{CredentialBundle, SystemClock, ToolTier};
use xbridge_mcp::{McpServer, Settings};

const CREDENTIALS_B64_ENV: &str = "XBRIDGE_CREDENTIALS_B64";

#[derive(Parser, Debug)]
#[command(name = "xbridge-mcp")]
#[command(about = "MCP server exposing the X (Twitter) API as tools", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "XBRIDGE_CONFIG", default_value = "xbridge.toml")]
    config: PathBuf,

    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Credential bundle as base64-encoded JSON
    #[arg(long, env = CREDENTIALS_B64_ENV, hide_env_values = true)]
    credentials_b64: Option<String>,

    /// Print the tool catalog as JSON and exit
    #[arg(long)]
    list_tools: bool,
}

fn load_credentials(args: &Args) -> Result<CredentialBundle> {
    let encoded = args
        .credentials_b64
        .clone()
        .or_else(|| std::env::var(CREDENTIALS_B64_ENV).ok());
    let from_env = CredentialBundle::from_env();
    match encoded {
        Some(encoded) => {
            let bundle = CredentialBundle::from_base64_json(encoded.trim())
                .context("Failed to decode credential bundle")?;
            Ok(bundle.or(from_env))
        }
        None => Ok(from_env),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load .env first so RUST_LOG and credentials from it take effect.
    let env_file = match &args.env_file {
        Some(path) => Some(
            dotenvy::from_path(path)
                .map(|_| path.clone())
                .with_context(|| format!("Failed to load env file {}", path.display()))?,
        ),
        None => dotenvy::dotenv().ok(),
    };

    // Stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "xbridge=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Some(path) = &env_file {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    let settings = Settings::load(&args.config)?;
    let credentials = load_credentials(&args)?;

    if credentials.is_empty() {
        tracing::warn!("No X credentials found; every tool call will fail with an auth error");
    } else if !credentials.satisfies(ToolTier::UserContext) {
        tracing::warn!(
            missing = ?credentials.missing_for(ToolTier::UserContext),
            "Only app credentials found; write tools are unavailable"
        );
    }

    let dispatcher = settings.build_dispatcher(credentials, Arc::new(SystemClock))?;

    if args.list_tools {
        let tools = dispatcher.registry().list();
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        api_url = %settings.upstream.api_url,
        "xbridge MCP server starting"
    );

    McpServer::new(Arc::new(dispatcher)).start().await
}
