//! Bulk lead import pipeline
//!
//! Stages, in order:
//! 1. store the raw upload ([`UploadStore`])
//! 2. decode it into sheets ([`ingest`], [`workbook`])
//! 3. find each sheet's header row and map columns ([`header`])
//! 4. normalize and de-duplicate rows ([`normalize`], [`dedupe`])
//! 5. persist accepted leads in one transaction ([`LeadStore`])

pub mod dedupe;
pub mod header;
pub mod ingest;
pub mod normalize;
pub mod phone;
pub mod workbook;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ImportError;
use crate::services::upload_store::UploadStore;
use crate::types::{
    DirectoryUser, ExistingContacts, ImportHistory, ImportResult, NewImportHistory,
    NormalizedLead, Sheet,
};

use dedupe::DuplicateIndex;
use header::{infer_header, HeaderInfo};
use normalize::{normalize_row, RowContext, RowOutcome};

/// Leads inserted per statement; all batches share one transaction
pub const BATCH_SIZE: usize = 1000;

/// Sheet-name keywords that mark a sheet as not holding lead data
pub const DEFAULT_EXCLUDED_SHEETS: &[&str] =
    &["old", "archive", "summary", "deleted", "junk", "temp", "sheet2", "sheet3"];

/// Result of persisting one import run
#[derive(Debug, Default)]
pub struct PersistOutcome {
    pub created: usize,
    /// `None` when the history insert failed after the leads were committed
    pub history: Option<ImportHistory>,
}

/// Storage collaborator of the pipeline.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Staff users that imported rows may be assigned to
    async fn load_directory(&self) -> anyhow::Result<Vec<DirectoryUser>>;

    /// Phones and emails of every lead already in the CRM
    async fn load_existing_contacts(&self) -> anyhow::Result<ExistingContacts>;

    /// Insert all leads (with one comment each) in `BATCH_SIZE` chunks inside
    /// a single transaction, then record the history entry.
    ///
    /// Any insert failure rolls back every lead of the run. A failed history
    /// insert is not an error; it is reported as `history: None`.
    async fn persist_import(
        &self,
        leads: &[NormalizedLead],
        history: NewImportHistory,
    ) -> Result<PersistOutcome, sqlx::Error>;
}

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub excluded_sheets: Vec<String>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            excluded_sheets: DEFAULT_EXCLUDED_SHEETS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub struct LeadImportService {
    store: Arc<dyn LeadStore>,
    uploads: UploadStore,
    settings: ImportSettings,
}

impl LeadImportService {
    pub fn new(store: Arc<dyn LeadStore>, uploads: UploadStore, settings: ImportSettings) -> Self {
        Self { store, uploads, settings }
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    /// Import one uploaded file on behalf of `created_by`.
    ///
    /// Row problems are reported in the returned [`ImportResult`]; an `Err`
    /// means nothing from this run was persisted (the raw upload excepted).
    pub async fn import(
        &self,
        created_by: Uuid,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<ImportResult, ImportError> {
        if bytes.is_empty() {
            return Err(ImportError::validation("No file uploaded"));
        }
        ingest::file_kind(original_filename)?;

        let stored_filename = self.uploads.save(original_filename, bytes).await?;
        info!(
            "Importing '{}' ({} bytes, stored as {}) for user {}",
            original_filename,
            bytes.len(),
            stored_filename,
            created_by
        );

        let sheets = ingest::read_sheets(original_filename, bytes, &self.settings.excluded_sheets)?;
        info!("Found {} data sheet(s) in '{}'", sheets.len(), original_filename);

        let directory = self.store.load_directory().await?;
        let existing = self.store.load_existing_contacts().await?;
        let mut index = DuplicateIndex::seeded(&existing);
        debug!(
            "Duplicate index seeded with {} phones and {} emails",
            index.phone_count(),
            index.email_count()
        );

        let ctx = RowContext { directory: &directory, created_by, now: Utc::now() };
        let mut result = ImportResult::default();
        let mut leads: Vec<NormalizedLead> = Vec::new();
        let mut mapped_sheets = 0;

        for sheet in &sheets {
            let Some(header) = infer_header(&sheet.rows) else {
                debug!("Sheet '{}' has no header row, skipping", sheet.name);
                continue;
            };
            mapped_sheets += 1;
            process_sheet(sheet, &header, &ctx, &mut index, &mut result, &mut leads);
        }

        if mapped_sheets == 0 {
            return Err(ImportError::validation("No data found in file"));
        }

        let history = NewImportHistory {
            filename: stored_filename,
            original_filename: original_filename.to_string(),
            total_rows: result.total as i32,
            created_count: leads.len() as i32,
            skipped_count: result.skipped as i32,
            error_count: result.errors as i32,
            created_by,
        };

        let outcome = self.store.persist_import(&leads, history).await.map_err(|e| {
            error!("Import of '{}' rolled back: {}", original_filename, e);
            ImportError::from(e)
        })?;

        if outcome.history.is_none() {
            warn!("Import of '{}' committed without a history entry", original_filename);
        }

        result.created = outcome.created as u32;
        result.success = true;
        info!(
            "Import of '{}' done: {} rows, {} created, {} skipped, {} errors",
            original_filename, result.total, result.created, result.skipped, result.errors
        );
        Ok(result)
    }
}

fn process_sheet(
    sheet: &Sheet,
    header: &HeaderInfo,
    ctx: &RowContext<'_>,
    index: &mut DuplicateIndex,
    result: &mut ImportResult,
    leads: &mut Vec<NormalizedLead>,
) {
    info!(
        "Sheet '{}': header at row {}, {} columns mapped",
        sheet.name,
        header.index + 1,
        header.mapping.len()
    );

    let (mut scanned, mut accepted, mut skipped, mut failed) = (0u32, 0u32, 0u32, 0u32);

    for (position, row) in sheet.rows.iter().enumerate().skip(header.index + 1) {
        if ingest::is_blank(row) {
            continue;
        }
        let row_number = position + 1;
        scanned += 1;
        result.total += 1;

        match normalize_row(row, row_number, &header.mapping, ctx, index) {
            Ok(RowOutcome::Accepted(lead)) => {
                accepted += 1;
                leads.push(*lead);
            }
            Ok(RowOutcome::Skipped(reason)) => {
                debug!("Sheet '{}' row {} skipped: {}", sheet.name, row_number, reason);
                skipped += 1;
                result.record_skip(&sheet.name, row_number, reason);
            }
            Err(err) => {
                debug!("Sheet '{}' row {} failed: {}", sheet.name, row_number, err);
                failed += 1;
                result.record_error(&sheet.name, row_number, err.to_string());
            }
        }
    }

    info!(
        "Sheet '{}': {} rows scanned, {} accepted, {} skipped, {} errors",
        sheet.name, scanned, accepted, skipped, failed
    );
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// In-memory [`LeadStore`] with transaction semantics: a run's leads
    /// become visible only if every batch succeeds.
    #[derive(Default)]
    pub struct MemoryLeadStore {
        pub directory: Vec<DirectoryUser>,
        pub leads: Mutex<Vec<NormalizedLead>>,
        pub comments: Mutex<Vec<String>>,
        pub history: Mutex<Vec<ImportHistory>>,
        /// Zero-based batch index that fails with a constraint error
        pub fail_on_batch: Option<usize>,
        pub fail_history: bool,
    }

    impl MemoryLeadStore {
        pub fn lead_count(&self) -> usize {
            self.leads.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LeadStore for MemoryLeadStore {
        async fn load_directory(&self) -> anyhow::Result<Vec<DirectoryUser>> {
            Ok(self.directory.clone())
        }

        async fn load_existing_contacts(&self) -> anyhow::Result<ExistingContacts> {
            let leads = self.leads.lock().unwrap();
            let mut contacts = ExistingContacts::default();
            for lead in leads.iter() {
                contacts.phones.extend(lead.phone_number.clone());
                contacts.phones.extend(lead.secondary_phone_number.clone());
                contacts.emails.extend(lead.email.clone());
            }
            Ok(contacts)
        }

        async fn persist_import(
            &self,
            leads: &[NormalizedLead],
            history: NewImportHistory,
        ) -> Result<PersistOutcome, sqlx::Error> {
            let mut staged = Vec::with_capacity(leads.len());
            for (batch_index, batch) in leads.chunks(BATCH_SIZE).enumerate() {
                if self.fail_on_batch == Some(batch_index) {
                    return Err(sqlx::Error::Protocol(format!(
                        "batch {batch_index} violates a constraint"
                    )));
                }
                staged.extend_from_slice(batch);
            }

            let created = staged.len();
            self.comments
                .lock()
                .unwrap()
                .extend(staged.iter().map(NormalizedLead::import_comment));
            self.leads.lock().unwrap().extend(staged);

            let history = (!self.fail_history).then(|| ImportHistory {
                id: Uuid::new_v4(),
                filename: history.filename,
                original_filename: history.original_filename,
                total_rows: history.total_rows,
                created_count: history.created_count,
                skipped_count: history.skipped_count,
                error_count: history.error_count,
                created_by: history.created_by,
                created_at: Utc::now(),
            });
            if let Some(ref entry) = history {
                self.history.lock().unwrap().push(entry.clone());
            }

            Ok(PersistOutcome { created, history })
        }
    }
}
