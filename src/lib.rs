pub mod admin;
pub mod config;
pub mod error;
pub mod nip05;
pub mod nostr;
pub mod store;
pub mod vault;
pub mod whitelist;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
