//! NATS message handlers

pub mod import;
pub mod ping;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::db::PgLeadStore;
use crate::services::lead_import::LeadImportService;
use crate::services::upload_store::UploadStore;

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let service = Arc::new(LeadImportService::new(
        Arc::new(PgLeadStore::new(pool.clone())),
        UploadStore::new(&config.upload_dir),
        config.import_settings(),
    ));
    info!("Uploads are stored in {}", config.upload_dir.display());

    let jwt_secret = Arc::new(config.jwt_secret.clone());
    let max_upload_bytes = config.max_upload_bytes;

    // Subscribe to all subjects
    let ping_sub = client.subscribe("leadport.ping").await?;
    let import_sub = client.subscribe("leadport.import.leads").await?;
    let history_list_sub = client.subscribe("leadport.import.history.list").await?;
    let history_download_sub = client.subscribe("leadport.import.history.download").await?;

    info!("Subscribed to NATS subjects");

    let client_ping = client.clone();
    let client_import = client.clone();
    let client_history_list = client.clone();
    let client_history_download = client.clone();

    let pool_history_list = pool.clone();
    let pool_history_download = pool;

    let service_import = Arc::clone(&service);
    let service_history_download = service;

    let jwt_secret_import = Arc::clone(&jwt_secret);
    let jwt_secret_history_list = Arc::clone(&jwt_secret);
    let jwt_secret_history_download = jwt_secret;

    // Spawn handlers
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub).await
    });

    let import_handle = tokio::spawn(async move {
        import::handle_import(client_import, import_sub, service_import, jwt_secret_import, max_upload_bytes).await
    });

    let history_list_handle = tokio::spawn(async move {
        import::handle_history_list(client_history_list, history_list_sub, pool_history_list, jwt_secret_history_list).await
    });

    let history_download_handle = tokio::spawn(async move {
        import::handle_history_download(
            client_history_download,
            history_download_sub,
            pool_history_download,
            service_history_download,
            jwt_secret_history_download,
        )
        .await
    });

    info!("All handlers started, waiting for messages...");

    // Wait for any handler to finish (which would indicate an error)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = import_handle => {
            error!("Import handler finished: {:?}", result);
        }
        result = history_list_handle => {
            error!("Import history list handler finished: {:?}", result);
        }
        result = history_download_handle => {
            error!("Import history download handler finished: {:?}", result);
        }
    }

    Ok(())
}
