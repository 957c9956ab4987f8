use anmore::admin::AdminPrincipalSet;
use anmore::config::AppConfig;
use anmore::store::SharedStore;
use anmore::whitelist::{whitelist_content, WhitelistResolver, WhitelistSnapshot};
use anyhow::Result;
use clap::Subcommand;
use std::fmt::Write;
use tracing::info;

#[derive(Subcommand)]
pub enum WhitelistCommand {
    /// Print the whitelist from the local cache or static defaults
    Show,
    /// Replace the local cache. No tags clears it.
    Set { tags: Vec<String> },
    /// Print the admin assertion content for the given (or current) tags
    Content { tags: Vec<String> },
}

fn resolver(config: &AppConfig, store: SharedStore) -> WhitelistResolver {
    WhitelistResolver::new(
        AdminPrincipalSet::from_config(&config.admin),
        store,
        config.whitelist.tags(),
        None,
    )
}

pub async fn run(command: WhitelistCommand, config: &AppConfig, store: SharedStore) -> Result<()> {
    let resolver = resolver(config, store);

    match command {
        WhitelistCommand::Show => print!("{}", render(&*resolver.resolve().await)),
        WhitelistCommand::Set { tags } => {
            let snapshot = resolver.set_local(tags).await?;
            info!(tags = snapshot.len(), "Local whitelist cache replaced");
            print!("{}", render(&*snapshot));
        }
        WhitelistCommand::Content { tags } => {
            let tags = if tags.is_empty() {
                resolver.resolve().await.to_vec()
            } else {
                tags
            };
            println!("{}", whitelist_content(tags));
        }
    }
    Ok(())
}

fn render(snapshot: &WhitelistSnapshot) -> String {
    let mut out = format!("Source: {}\n", snapshot.origin().as_str());
    if snapshot.is_empty() {
        out.push_str("(empty: every tag is allowed)\n");
    }
    for tag in snapshot.tags() {
        let _ = writeln!(out, "#{}", tag);
    }
    out
}
