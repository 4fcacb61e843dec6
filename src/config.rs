//! Configuration management

use std::path::PathBuf;

use anyhow::{self, Context, Result};

use crate::services::lead_import::{ImportSettings, DEFAULT_EXCLUDED_SHEETS};

const DEFAULT_NATS_URL: &str = "nats://localhost:4222";
const DEFAULT_UPLOAD_DIR: &str = "uploads/imports";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const MIN_JWT_SECRET_BYTES: usize = 32;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials (both must be set to be used)
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// PostgreSQL connection string
    pub database_url: String,

    /// JWT secret key for token validation
    pub jwt_secret: String,

    /// Directory raw uploads are kept in
    pub upload_dir: PathBuf,

    /// Largest accepted upload after base64 decoding
    pub max_upload_bytes: usize,

    /// Sheet-name keywords excluded from import
    pub excluded_sheets: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let nats_url = var("NATS_URL").unwrap_or_else(|| DEFAULT_NATS_URL.to_string());

        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let jwt_secret = var("JWT_SECRET")
            .context("JWT_SECRET must be set, generate one with: openssl rand -base64 48")?;
        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            anyhow::bail!(
                "JWT_SECRET must be at least {} bytes (current: {} bytes)",
                MIN_JWT_SECRET_BYTES,
                jwt_secret.len()
            );
        }

        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("MAX_UPLOAD_BYTES must be a byte count, got '{raw}'"))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let excluded_sheets = match var("IMPORT_EXCLUDED_SHEETS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_EXCLUDED_SHEETS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            nats_url,
            nats_user: var("NATS_USER"),
            nats_password: var("NATS_PASSWORD"),
            database_url,
            jwt_secret,
            upload_dir: PathBuf::from(var("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string())),
            max_upload_bytes,
            excluded_sheets,
        })
    }

    pub fn import_settings(&self) -> ImportSettings {
        ImportSettings { excluded_sheets: self.excluded_sheets.clone() }
    }
}
