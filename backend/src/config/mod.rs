//! Configuration module for the quiz bank backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;
use crate::models::RemoteConfig;
use crate::provision::{bootstrap_accounts, SeedAccount};

pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_TEACHER_PASSWORD: &str = "guru123";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to the local key-space SQLite file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Remote credentials supplied by the environment
    pub remote: Option<RemoteConfig>,
    /// Bound on the reachability probe and each remote round trip
    pub remote_timeout: Duration,
    pub seed_admin_password: String,
    pub seed_teacher_password: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = non_empty_var("QUIZBANK_API_PSK");

        let db_path = env::var("QUIZBANK_DB_PATH")
            .unwrap_or_else(|_| "./data/quizbank.sqlite".to_string())
            .into();

        let bind_addr = env::var("QUIZBANK_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Validation(format!("Invalid QUIZBANK_BIND_ADDR: {}", e)))?;

        let log_level = env::var("QUIZBANK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let remote = match (
            non_empty_var("QUIZBANK_REMOTE_URL"),
            non_empty_var("QUIZBANK_REMOTE_TOKEN"),
        ) {
            (Some(endpoint), Some(token)) => Some(RemoteConfig::new(endpoint, token)),
            _ => None,
        };

        let remote_timeout = match non_empty_var("QUIZBANK_REMOTE_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    AppError::Validation(format!("Invalid QUIZBANK_REMOTE_TIMEOUT_SECS: {}", raw))
                })?,
            None => Duration::from_secs(10),
        };

        let seed_admin_password = non_empty_var("QUIZBANK_SEED_ADMIN_PASSWORD")
            .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string());
        let seed_teacher_password = non_empty_var("QUIZBANK_SEED_TEACHER_PASSWORD")
            .unwrap_or_else(|| DEFAULT_TEACHER_PASSWORD.to_string());

        Ok(Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            remote,
            remote_timeout,
            seed_admin_password,
            seed_teacher_password,
        })
    }

    pub fn seed_accounts(&self) -> Vec<SeedAccount> {
        bootstrap_accounts(&self.seed_admin_password, &self.seed_teacher_password)
    }

    /// Whether either bootstrap account still uses its built-in password.
    pub fn uses_default_seed_passwords(&self) -> bool {
        self.seed_admin_password == DEFAULT_ADMIN_PASSWORD
            || self.seed_teacher_password == DEFAULT_TEACHER_PASSWORD
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
