use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use levo::config::{load_config, signer_key};
use levo::notify::TracingSink;

#[derive(Parser, Debug)]
#[command(
    name = "levo",
    about = "Levo - leveraged lending rebalancer: periodically asks an advisory oracle whether to lever up, lever down or hold, and executes the decision on-chain"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/levo.toml")]
    config: PathBuf,

    /// Account to rebalance (checksummed). Defaults to the signing key's address.
    #[arg(short, long)]
    account: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    let key = signer_key(&config, |name| std::env::var(name).ok())
        .context("Signing key unavailable")?;

    let (manager, signer) = levo::build_session_manager(&config, &key, Arc::new(TracingSink))
        .context("Failed to build session manager")?;

    let account = match cli.account.as_deref() {
        Some(raw) => Address::parse_checksummed(raw, None)
            .with_context(|| format!("Invalid checksummed account: {raw}"))?,
        None => signer,
    };
    if account != signer {
        bail!("account {account} does not match signing key address {signer}");
    }

    let session = manager
        .start(account)
        .await
        .map_err(|e| anyhow::anyhow!("Session error: {e}"))?;
    tracing::info!(session_id = %session, "Rebalancer running, Ctrl-C to stop");

    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Received shutdown signal");
    manager.shutdown().await;

    Ok(())
}
