//! Leadport Worker - bulk lead import service for the CRM
//!
//! Connects to NATS and PostgreSQL and turns uploaded spreadsheets into leads.

mod auth;
mod cli;
mod config;
mod db;
mod error;
mod handlers;
mod services;
mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::PgPool;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::services::lead_import::LeadImportService;
use crate::services::upload_store::UploadStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,leadport_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    info!("Starting Leadport Worker...");

    let config = Config::from_env()?;
    info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => db::run_migrations(&pool).await,
        Command::Import { file, user_email } => import_file(pool, &config, &file, &user_email).await,
        Command::Serve => serve(pool, &config).await,
    }
}

async fn serve(pool: PgPool, config: &Config) -> Result<()> {
    db::run_migrations(&pool).await?;

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth)
    let nats_client = match (&config.nats_user, &config.nats_password) {
        (Some(user), Some(password)) => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    if let Err(e) = handlers::start_handlers(nats_client, pool, config).await {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Run one import from the command line and print the result as JSON
async fn import_file(pool: PgPool, config: &Config, file: &Path, user_email: &str) -> Result<()> {
    db::run_migrations(&pool).await?;

    let user = db::queries::user::get_user_by_email(&pool, user_email)
        .await?
        .with_context(|| format!("No user with email {}", user_email))?;

    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let original_filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} is not a file", file.display()))?;

    let service = LeadImportService::new(
        Arc::new(db::PgLeadStore::new(pool.clone())),
        UploadStore::new(&config.upload_dir),
        config.import_settings(),
    );

    let result = service
        .import(user.id, &original_filename, &bytes)
        .await
        .with_context(|| format!("Import of {} failed", original_filename))?;

    let total = db::queries::lead::count_leads(&pool).await?;
    info!("CRM now holds {} leads", total);

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
