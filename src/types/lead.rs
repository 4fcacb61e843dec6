//! Lead types produced by the import pipeline

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_SOURCE: &str = "Bulk Import";
pub const DEFAULT_PRIORITY: &str = "Medium";
pub const DEFAULT_FOLLOW_UP_STATUS: &str = "Pending";

/// Comment values that count as "no comment"
const PLACEHOLDER_COMMENTS: &[&str] = &["-", "n/a", "na", "none", "nil"];

/// Lead pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadStatus {
    New,
    Unassigned,
    Assigned,
    #[serde(rename = "Follow-up")]
    FollowUp,
    Prospect,
    #[serde(rename = "Not Eligible")]
    NotEligible,
    #[serde(rename = "Not Interested")]
    NotInterested,
    #[serde(rename = "Registration Completed")]
    RegistrationCompleted,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "New",
            LeadStatus::Unassigned => "Unassigned",
            LeadStatus::Assigned => "Assigned",
            LeadStatus::FollowUp => "Follow-up",
            LeadStatus::Prospect => "Prospect",
            LeadStatus::NotEligible => "Not Eligible",
            LeadStatus::NotInterested => "Not Interested",
            LeadStatus::RegistrationCompleted => "Registration Completed",
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cleaned, validated lead candidate ready for persistence
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedLead {
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub phone_country_code: Option<String>,
    pub whatsapp_number: Option<String>,
    pub secondary_phone_number: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub program: Option<String>,
    pub occupation: Option<String>,
    pub source: String,
    pub status: LeadStatus,
    pub priority: String,
    pub comment: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_status: String,
    pub ielts_score: Option<String>,
    pub assigned_staff_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NormalizedLead {
    /// Text of the activity comment stored alongside the imported lead.
    pub fn import_comment(&self) -> String {
        match self.comment.as_deref().map(str::trim) {
            Some(text) if !is_placeholder_comment(text) => text.to_string(),
            _ => format!(
                "System: Lead imported from {}. Initial Status: {}.",
                self.source, self.status
            ),
        }
    }
}

fn is_placeholder_comment(text: &str) -> bool {
    text.is_empty() || PLACEHOLDER_COMMENTS.contains(&text.to_lowercase().as_str())
}
