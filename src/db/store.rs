//! PostgreSQL-backed lead store

use async_trait::async_trait;
use sqlx::{Connection, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::services::lead_import::{LeadStore, PersistOutcome, BATCH_SIZE};
use crate::types::{DirectoryUser, ExistingContacts, NewImportHistory, NormalizedLead};

#[derive(Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn load_directory(&self) -> anyhow::Result<Vec<DirectoryUser>> {
        queries::user::list_directory(&self.pool).await
    }

    async fn load_existing_contacts(&self) -> anyhow::Result<ExistingContacts> {
        queries::lead::existing_contacts(&self.pool).await
    }

    async fn persist_import(
        &self,
        leads: &[NormalizedLead],
        history: NewImportHistory,
    ) -> Result<PersistOutcome, sqlx::Error> {
        // One connection for the whole run: batches, comments, then history
        let mut conn = self.pool.acquire().await?;

        let mut tx = conn.begin().await?;
        let mut created = 0usize;
        for (batch_index, batch) in leads.chunks(BATCH_SIZE).enumerate() {
            let ids: Vec<Uuid> = batch.iter().map(|_| Uuid::new_v4()).collect();
            let inserted = queries::lead::insert_leads(&mut tx, batch, &ids).await?;
            queries::lead::insert_import_comments(&mut tx, batch, &ids).await?;
            created += inserted as usize;
            debug!("Inserted batch {} ({} leads)", batch_index + 1, inserted);
        }
        tx.commit().await?;

        let history = match queries::import_history::insert_history(&mut conn, &history).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Failed to record import history for {}: {}", history.original_filename, e);
                None
            }
        };

        Ok(PersistOutcome { created, history })
    }
}
