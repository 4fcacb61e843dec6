//! Blob store for raw import uploads
//!
//! Files are kept on local disk under `{timestamp}_{sanitized original name}`
//! so an import can be re-downloaded from its history entry.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::debug;

const FALLBACK_NAME: &str = "upload";

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist the upload and return the stored filename.
    pub async fn save(&self, original_filename: &str, bytes: &[u8]) -> io::Result<String> {
        fs::create_dir_all(&self.root).await?;
        let stored = stored_name(original_filename, Utc::now());
        fs::write(self.root.join(&stored), bytes).await?;
        debug!("Stored upload {} ({} bytes)", stored, bytes.len());
        Ok(stored)
    }

    /// Read back a stored upload. Names that could escape the store root are
    /// rejected with `InvalidInput`.
    pub async fn read(&self, stored_filename: &str) -> io::Result<Vec<u8>> {
        if !is_plain_name(stored_filename) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid stored filename: {stored_filename}"),
            ));
        }
        fs::read(self.root.join(stored_filename)).await
    }
}

/// `{unix millis}_{sanitized name}`
pub fn stored_name(original_filename: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}", now.timestamp_millis(), sanitize_filename(original_filename))
}

/// Last path component with everything outside `[A-Za-z0-9._-]` replaced by `_`.
pub fn sanitize_filename(original_filename: &str) -> String {
    let base = original_filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
