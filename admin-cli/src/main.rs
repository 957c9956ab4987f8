mod nip05;
mod prompt;
mod vault;
mod whitelist;

use anmore::admin::{derive_public_identity, encode_public_identity};
use anmore::config::AppConfig;
use anmore::store::{SharedStore, SqliteStore};
use anmore::AppResult;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "anmore-admin")]
#[command(about = "Admin CLI for Anmore", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the admin public key from an nsec (ADMIN_NSEC, config or prompt)
    Pubkey {
        /// Name used in the printed nostr.json snippet
        #[arg(long, default_value = "admin")]
        name: String,
    },
    /// Password-encrypted local key storage
    Vault {
        #[command(subcommand)]
        command: vault::VaultCommand,
    },
    /// Local hashtag whitelist
    Whitelist {
        #[command(subcommand)]
        command: whitelist::WhitelistCommand,
    },
    /// NIP-05 registration service
    Nip05 {
        #[command(subcommand)]
        command: nip05::Nip05Command,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays pipeable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anmore=info,anmore_admin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    debug!(version = env!("CARGO_PKG_VERSION"), "anmore-admin starting");

    match cli.command {
        Commands::Pubkey { name } => pubkey(&config, &name),
        Commands::Vault { command } => vault::run(command, open_store(&config).await?).await,
        Commands::Whitelist { command } => {
            let store = open_store(&config).await?;
            whitelist::run(command, &config, store).await
        }
        Commands::Nip05 { command } => nip05::run(command, &config).await,
    }
}

async fn open_store(config: &AppConfig) -> AppResult<SharedStore> {
    let store = SqliteStore::connect(&config.database.url, config.database.max_connections).await?;
    info!(max_connections = config.database.max_connections, "Local store opened");
    Ok(Arc::new(store))
}

fn pubkey(config: &AppConfig, name: &str) -> anyhow::Result<()> {
    let nsec = match std::env::var("ADMIN_NSEC") {
        Ok(value) if !value.trim().is_empty() => Zeroizing::new(value),
        _ => match config.admin.secret() {
            Some(secret) => Zeroizing::new(secret.to_string()),
            None => prompt::secret("Admin nsec: ")?,
        },
    };

    let hex = derive_public_identity(nsec.trim()).map_err(|_| anyhow::anyhow!("Not a valid nsec"))?;

    println!("Public key (hex): {}", hex);
    if let Some(npub) = encode_public_identity(&hex) {
        println!("Public key (npub): {}", npub);
    }
    println!();
    println!("nostr.json:");
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "names": { name: hex } }))?
    );
    println!();
    println!("Set ANMORE_ADMIN__PUBKEYS={} to trust this key without the secret.", hex);
    Ok(())
}
