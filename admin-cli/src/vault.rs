use anmore::admin::derive_public_identity;
use anmore::store::SharedStore;
use anmore::vault::{SecretMaterial, Vault};
use anmore::AppError;
use anyhow::{anyhow, bail, Result};
use clap::Subcommand;
use tracing::info;

use crate::prompt;

#[derive(Subcommand)]
pub enum VaultCommand {
    /// Encrypt an nsec under a password and store it
    Save {
        /// Stable identifier, e.g. a NIP-05 address
        #[arg(long)]
        id: String,
    },
    /// Decrypt a stored key and print its public key
    Unlock {
        #[arg(long)]
        id: String,
    },
    /// Check whether a key is stored
    Exists {
        #[arg(long)]
        id: String,
    },
    /// Delete a stored key
    Remove {
        #[arg(long)]
        id: String,
    },
}

pub async fn run(command: VaultCommand, store: SharedStore) -> Result<()> {
    let vault = Vault::new(store);

    match command {
        VaultCommand::Save { id } => {
            let nsec = prompt::secret("nsec to store: ")?;
            let pubkey =
                derive_public_identity(&nsec).map_err(|_| anyhow!("Not a valid nsec"))?;
            let password = prompt::new_password()?;

            vault
                .save(&id, &SecretMaterial::from(nsec.as_str()), &password)
                .await?;
            info!(id = %id, "Encrypted key stored");
            println!("Stored encrypted key for {} ({})", id, pubkey);
        }
        VaultCommand::Unlock { id } => {
            let password = prompt::password("Password: ")?;
            let secret = match vault.load(&id, &password).await.map_err(AppError::from) {
                Ok(Some(secret)) => secret,
                Ok(None) => bail!("No key stored for {}", id),
                Err(e) if e.is_retryable_unlock() => {
                    bail!("{}. Check the password and try again.", e)
                }
                Err(e) => return Err(e.into()),
            };

            let pubkey = secret
                .as_str()
                .and_then(|nsec| derive_public_identity(nsec).ok())
                .ok_or_else(|| anyhow!("Stored secret is not an nsec"))?;
            println!("Unlocked {}: {}", id, pubkey);
        }
        VaultCommand::Exists { id } => {
            let exists = vault.exists(&id).await?;
            println!("{}", exists);
        }
        VaultCommand::Remove { id } => {
            if vault.remove(&id).await? {
                info!(id = %id, "Encrypted key removed");
                println!("Removed key for {}", id);
            } else {
                println!("No key stored for {}", id);
            }
        }
    }
    Ok(())
}
