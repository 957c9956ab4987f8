use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;
use std::fmt;

/// Admin identity configuration.
///
/// Either a comma-separated list of public identities or a single `nsec`
/// secret literal. When both are present the secret wins.
#[derive(Deserialize, Clone, Default)]
pub struct AdminConfig {
    /// Comma-separated hex or `npub1…` public identities
    #[serde(default)]
    pub pubkeys: String,
    /// Admin secret key literal (`nsec1…`)
    #[serde(default)]
    pub nsec: Option<String>,
}

impl AdminConfig {
    /// Configured public identities, split and trimmed. Empty entries are dropped.
    pub fn pubkey_list(&self) -> Vec<String> {
        from_csv(&self.pubkeys)
    }

    /// The configured secret literal, if it is non-blank.
    pub fn secret(&self) -> Option<&str> {
        self.nsec
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminConfig")
            .field("pubkeys", &self.pubkeys)
            .field("nsec", &self.nsec.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Moderation whitelist defaults from deployment configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WhitelistConfig {
    /// Comma-separated default hashtags
    #[serde(default)]
    pub default_tags: String,
}

impl WhitelistConfig {
    pub fn tags(&self) -> Vec<String> {
        from_csv(&self.default_tags)
    }
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite://anmore.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// NIP-05 registration service configuration
#[derive(Deserialize, Clone)]
pub struct Nip05Config {
    #[serde(default = "default_nip05_url")]
    pub url: String,
    /// Bearer key for the admin endpoints
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_nip05_timeout")]
    pub timeout_secs: u64,
}

fn default_nip05_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_nip05_timeout() -> u64 {
    10
}

impl Default for Nip05Config {
    fn default() -> Self {
        Self {
            url: default_nip05_url(),
            api_key: None,
            timeout_secs: default_nip05_timeout(),
        }
    }
}

impl fmt::Debug for Nip05Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nip05Config")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Helper to build service URLs with proper slash handling
impl Nip05Config {
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }
}

/// Root application configuration.
///
/// Read once at process start and handed to consumers by reference.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub whitelist: WhitelistConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub nip05: Nip05Config,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            // Start with default config file
            .add_source(File::with_name("config/default").required(false))
            // Override with local config if present
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (prefix: ANMORE_)
            // e.g., ANMORE_ADMIN__PUBKEYS, ANMORE_WHITELIST__DEFAULT_TAGS
            .add_source(
                Environment::with_prefix("ANMORE")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::from_builder(builder)
    }

    /// Build from an already assembled set of sources.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}

/// Split a comma-separated value, trimming entries and dropping empty ones.
pub fn from_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
