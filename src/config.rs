//! Command-line and environment configuration.

use crate::application::purchase::{RetryPolicy, SelfPurchasePolicy};
use crate::interfaces::http::state::HttpSettings;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Game marketplace backend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API.
    Serve(ServeArgs),
    /// Load a catalog fixture CSV (`title,category,price,summary`) into an empty catalog.
    Import(ImportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "GAMEMARKET_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Upper bound on waiting for a row lock, in milliseconds.
    #[arg(long, env = "GAMEMARKET_LOCK_WAIT_MS", default_value_t = 5000)]
    pub lock_wait_ms: u64,
}

impl StoreArgs {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "GAMEMARKET_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    #[command(flatten)]
    pub store: StoreArgs,

    /// HS256 secret shared with the token issuer.
    #[arg(long, env = "GAMEMARKET_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "GAMEMARKET_SELF_PURCHASE", default_value = "allow")]
    pub self_purchase: SelfPurchasePolicy,

    /// Attempts per buy request when the store reports lock contention.
    #[arg(long, default_value_t = 3)]
    pub purchase_retries: u32,

    /// Catalog fixture loaded at startup when the catalog is empty.
    #[arg(long)]
    pub fixture: Option<PathBuf>,
}

impl ServeArgs {
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            jwt_secret: self.jwt_secret.clone(),
            self_purchase: self.self_purchase,
            retry: RetryPolicy {
                max_attempts: self.purchase_retries.max(1),
                ..RetryPolicy::default()
            },
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Input fixture CSV file
    pub input: PathBuf,

    #[command(flatten)]
    pub store: StoreArgs,
}
