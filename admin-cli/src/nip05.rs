use anmore::config::AppConfig;
use anmore::nip05::Nip05Client;
use anyhow::Result;
use tracing::debug;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum Nip05Command {
    /// Look up the public key bound to a username
    Lookup { username: String },
    /// Submit a registration for approval
    Register {
        username: String,
        /// 64-character hex public key
        pubkey: String,
        #[arg(long)]
        domain: Option<String>,
    },
    /// List pending registrations
    Pending,
    /// Approve a pending registration
    Approve { username: String, pubkey: String },
    /// Reject a pending registration
    Reject { username: String },
    /// List approved registrations
    Registrations,
}

pub async fn run(command: Nip05Command, config: &AppConfig) -> Result<()> {
    let client = Nip05Client::new(&config.nip05)?;
    debug!(service = client.base_url(), "Using NIP-05 service");

    match command {
        Nip05Command::Lookup { username } => match client.lookup(&username).await? {
            Some(pubkey) => println!("{}", pubkey),
            None => println!("{} is not registered", username),
        },
        Nip05Command::Register {
            username,
            pubkey,
            domain,
        } => {
            let message = client.register(&username, &pubkey, domain.as_deref()).await?;
            println!("{}", message);
        }
        Nip05Command::Pending => {
            let pending = client.pending().await?;
            if pending.is_empty() {
                println!("No pending registrations");
            }
            for p in pending {
                println!("{}@{}  {}  {}", p.username, p.domain, p.pubkey, p.timestamp.to_rfc3339());
            }
        }
        Nip05Command::Approve { username, pubkey } => {
            println!("{}", client.approve(&username, &pubkey).await?);
        }
        Nip05Command::Reject { username } => {
            println!("{}", client.reject(&username).await?);
        }
        Nip05Command::Registrations => {
            for r in client.registrations().await? {
                println!("{}  {}", r.nip05, r.pubkey);
            }
        }
    }
    Ok(())
}
