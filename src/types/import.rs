//! Import types for bulk lead upload

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Maximum number of row diagnostics kept per list
pub const MAX_ROW_ISSUES: usize = 100;

/// One row of raw cell values, positionally aligned to the header row
pub type RawRow = Vec<String>;

/// A sheet (or the single table of a delimited file) after decoding
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<RawRow>,
}

/// Request to import a spreadsheet or CSV file of leads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadImportRequest {
    pub filename: String,
    pub content_base64: String,
}

/// Skipped or failed row description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowIssue {
    pub row: usize,
    pub sheet: String,
    pub message: String,
}

/// Outcome of one import call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub total: u32,
    pub created: u32,
    pub skipped: u32,
    pub errors: u32,
    pub error_rows: Vec<RowIssue>,
    pub skipped_rows: Vec<RowIssue>,
}

impl ImportResult {
    pub fn record_skip(&mut self, sheet: &str, row: usize, message: impl Into<String>) {
        self.skipped += 1;
        if self.skipped_rows.len() < MAX_ROW_ISSUES {
            self.skipped_rows.push(RowIssue { row, sheet: sheet.to_string(), message: message.into() });
        }
    }

    pub fn record_error(&mut self, sheet: &str, row: usize, message: impl Into<String>) {
        self.errors += 1;
        if self.error_rows.len() < MAX_ROW_ISSUES {
            self.error_rows.push(RowIssue { row, sheet: sheet.to_string(), message: message.into() });
        }
    }
}

/// Audit record of one bulk import
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ImportHistory {
    pub id: Uuid,
    pub filename: String,
    pub original_filename: String,
    pub total_rows: i32,
    pub created_count: i32,
    pub skipped_count: i32,
    pub error_count: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Import history entry to be written after the leads are committed
#[derive(Debug, Clone)]
pub struct NewImportHistory {
    pub filename: String,
    pub original_filename: String,
    pub total_rows: i32,
    pub created_count: i32,
    pub skipped_count: i32,
    pub error_count: i32,
    pub created_by: Uuid,
}

/// Phone numbers and emails already present in the CRM
#[derive(Debug, Clone, Default)]
pub struct ExistingContacts {
    pub phones: Vec<String>,
    pub emails: Vec<String>,
}

/// Request to re-download the raw file of an import
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFileRequest {
    pub import_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFileResponse {
    pub filename: String,
    pub original_filename: String,
    pub content_base64: String,
}
