//! Configuration module for the ResQ backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Optional pre-shared key gating the whole API
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy search index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of plain text
    pub log_json: bool,
    /// Failed PIN attempts allowed before a lockout; 0 disables throttling
    pub pin_max_attempts: u32,
    /// How long a lockout lasts
    pub pin_lockout: Duration,
    /// Insert the demo field mission on startup
    pub seed_demo: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("RESQ_API_PSK").ok().filter(|k| !k.is_empty());

        let db_path = env::var("RESQ_DB_PATH")
            .unwrap_or_else(|_| "./data/resq.sqlite".to_string())
            .into();

        let index_path = env::var("RESQ_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let bind_addr = parse_var("RESQ_BIND_ADDR", "127.0.0.1:8080")?;
        let log_level = env::var("RESQ_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_json = parse_var("RESQ_LOG_JSON", "false")?;
        let pin_max_attempts = parse_var("RESQ_PIN_MAX_ATTEMPTS", "5")?;
        let lockout_secs: u64 = parse_var("RESQ_PIN_LOCKOUT_SECS", "300")?;
        let seed_demo = parse_var("RESQ_SEED_DEMO", "false")?;

        Ok(Self {
            api_psk,
            db_path,
            index_path,
            bind_addr,
            log_level,
            log_json,
            pin_max_attempts,
            pin_lockout: Duration::from_secs(lockout_secs),
            seed_demo,
        })
    }
}

fn parse_var<T: FromStr>(key: &str, default: &str) -> Result<T, AppError>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e| AppError::Internal(format!("Invalid {} value {:?}: {}", key, raw, e)))
}
