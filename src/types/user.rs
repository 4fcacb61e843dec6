//! User directory types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Staff member as seen by the import pipeline when resolving assignments
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DirectoryUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}
