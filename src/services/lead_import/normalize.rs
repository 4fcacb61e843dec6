//! Per-row cleanup: one raw spreadsheet row in, one lead (or a reason not to
//! import it) out.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::types::{
    DirectoryUser, LeadStatus, NormalizedLead, RawRow,
    DEFAULT_FOLLOW_UP_STATUS, DEFAULT_PRIORITY, DEFAULT_SOURCE,
};

use super::dedupe::DuplicateIndex;
use super::header::{CanonicalField, ColumnMapping};
use super::phone::{
    clean_phone, code_for_country, digits_only, infer_from_digits, national_key,
    normalize_code, split_explicit_prefix,
};

/// Digit count range of a cell that looks like a phone number
const CANDIDATE_DIGITS: std::ops::RangeInclusive<usize> = 10..=16;

/// Minimum digits for an explicitly mapped phone column to be used
const MAPPED_PHONE_MIN_DIGITS: usize = 7;

/// Cells mentioning these are never phone numbers, however many digits they hold
const PHONE_NOISE: &[&str] = &["yrs", "age", "qualification", "score", "date", "interest", "course", "exp"];

/// Stripped from both ends of a name
const NAME_WRAPPERS: &[char] = &['_', '-', '@', '*', '+', '"', '\'', '`', '(', ')', '[', ']', '{', '}', '<', '>'];

/// Spreadsheet serial numbers accepted as dates
const SERIAL_DATE_RANGE: std::ops::RangeInclusive<f64> = 10_000.0..=90_000.0;

/// Days between 1899-12-30 and the Unix epoch
const SERIAL_UNIX_OFFSET: f64 = 25_569.0;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%m/%d/%Y", "%Y/%m/%d",
    "%d %b %Y", "%d %B %Y", "%b %d, %Y", "%B %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M"];

const SHORT_TEXT_LIMIT: usize = 255;
const COMMENT_LIMIT: usize = 5_000;

/// Row-local failure; recorded against the row, never aborts the import
#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("Value too long for {field} ({length} > {limit} characters)")]
    TooLong { field: &'static str, length: usize, limit: usize },
}

/// What happened to a row that did not fail
#[derive(Debug)]
pub enum RowOutcome {
    Accepted(Box<NormalizedLead>),
    Skipped(String),
}

/// Run-wide inputs shared by every row
pub struct RowContext<'a> {
    pub directory: &'a [DirectoryUser],
    pub created_by: Uuid,
    pub now: DateTime<Utc>,
}

/// Mapped cells of one row
struct Cells<'a> {
    row: &'a RawRow,
    mapping: &'a ColumnMapping,
}

impl<'a> Cells<'a> {
    fn get(&self, field: CanonicalField) -> Option<&'a str> {
        let column = self.mapping.get(field)?;
        let value = self.row.get(column)?.trim();
        (!value.is_empty()).then_some(value)
    }

    fn owned(&self, field: CanonicalField) -> Option<String> {
        self.get(field).map(str::to_string)
    }
}

/// Normalize one data row.
///
/// `row_number` is the 1-based position of the row in its sheet and only
/// feeds the placeholder name. An accepted row's phones and email are added
/// to `index` before returning.
pub fn normalize_row(
    row: &RawRow,
    row_number: usize,
    mapping: &ColumnMapping,
    ctx: &RowContext<'_>,
    index: &mut DuplicateIndex,
) -> Result<RowOutcome, RowError> {
    let cells = Cells { row, mapping };

    let email = cells.get(CanonicalField::Email).and_then(clean_email);
    if let Some(ref email) = email {
        if index.has_email(email) {
            return Ok(RowOutcome::Skipped("Email already in CRM".to_string()));
        }
    }

    let phones = select_phones(&cells, index);
    if phones.primary.is_none() && !phones.duplicates.is_empty() {
        return Ok(RowOutcome::Skipped(format!(
            "Phone already in CRM: {}",
            phones.duplicates.join(", ")
        )));
    }

    let name = resolve_name(&cells, row, row_number);
    let phone_country_code = infer_country_code(&cells, phones.primary);
    let phone_number = phones.primary.map(national_key).filter(|p| !p.is_empty());
    let secondary_phone_number = phones.secondary.map(clean_phone).filter(|p| !p.is_empty());

    let assigned = cells
        .get(CanonicalField::AssignedStaff)
        .and_then(|value| resolve_staff(value, ctx.directory));
    let status = derive_status(cells.get(CanonicalField::Status), assigned.is_some());

    let lead = NormalizedLead {
        name,
        first_name: cells.owned(CanonicalField::FirstName),
        last_name: cells.owned(CanonicalField::LastName),
        phone_number,
        phone_country_code,
        whatsapp_number: cells
            .get(CanonicalField::WhatsappNumber)
            .map(clean_phone)
            .filter(|p| !p.is_empty()),
        secondary_phone_number,
        email,
        country: cells.owned(CanonicalField::Country),
        program: cells.owned(CanonicalField::Program),
        occupation: cells.owned(CanonicalField::Occupation),
        source: cells.get(CanonicalField::Source).unwrap_or(DEFAULT_SOURCE).to_string(),
        status,
        priority: cells.get(CanonicalField::Priority).unwrap_or(DEFAULT_PRIORITY).to_string(),
        comment: cells.owned(CanonicalField::Comment),
        follow_up_date: cells.get(CanonicalField::FollowUpDate).and_then(parse_date),
        follow_up_status: cells
            .get(CanonicalField::FollowUpStatus)
            .unwrap_or(DEFAULT_FOLLOW_UP_STATUS)
            .to_string(),
        ielts_score: cells.owned(CanonicalField::IeltsScore),
        assigned_staff_id: assigned.map(|user| user.id),
        created_by: ctx.created_by,
        created_at: ctx.now,
        updated_at: ctx.now,
    };

    check_lengths(&lead)?;

    if let Some(ref phone) = lead.phone_number {
        index.add_phone(phone);
    }
    if let Some(ref phone) = lead.secondary_phone_number {
        index.add_phone(phone);
    }
    if let Some(ref email) = lead.email {
        index.add_email(email);
    }

    debug!(
        "Row {} accepted: phone={:?} code={:?} status={}",
        row_number, lead.phone_number, lead.phone_country_code, lead.status
    );
    Ok(RowOutcome::Accepted(Box::new(lead)))
}

// =============================================================================
// NAME
// =============================================================================

pub fn clean_name(value: &str) -> &str {
    value.trim_matches(|c: char| c.is_whitespace() || NAME_WRAPPERS.contains(&c))
}

fn is_usable_name(value: &str) -> bool {
    let mut chars = value.chars().filter(|c| !c.is_whitespace()).peekable();
    chars.peek().is_some() && !chars.all(|c| c.is_ascii_digit())
}

fn resolve_name(cells: &Cells<'_>, row: &RawRow, row_number: usize) -> String {
    let original = match cells.get(CanonicalField::Name) {
        Some(name) => name.to_string(),
        None => [cells.get(CanonicalField::FirstName), cells.get(CanonicalField::LastName)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" "),
    };

    let cleaned = clean_name(&original);
    if is_usable_name(cleaned) {
        return cleaned.to_string();
    }
    if let Some(first) = row.first().map(|cell| clean_name(cell)).filter(|c| is_usable_name(c)) {
        return first.to_string();
    }
    let original = original.trim();
    if !original.is_empty() {
        return original.to_string();
    }
    format!("Row {row_number}")
}

// =============================================================================
// EMAIL
// =============================================================================

fn clean_email(value: &str) -> Option<String> {
    let email = value.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    (!local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace)).then_some(email)
}

// =============================================================================
// PHONES
// =============================================================================

struct PhoneSelection<'a> {
    primary: Option<&'a str>,
    secondary: Option<&'a str>,
    /// Phone-like values that were rejected because they are already known
    duplicates: Vec<String>,
}

/// Every cell of the row that looks like a phone number, first occurrence
/// of each digit string only.
fn phone_candidates(row: &RawRow) -> Vec<&str> {
    let mut seen: Vec<String> = Vec::new();
    let mut candidates = Vec::new();
    for cell in row {
        let cell = cell.trim();
        let digits = digits_only(cell);
        if !CANDIDATE_DIGITS.contains(&digits.len()) {
            continue;
        }
        let lower = cell.to_lowercase();
        if PHONE_NOISE.iter().any(|noise| lower.contains(noise)) {
            continue;
        }
        if !seen.contains(&digits) {
            seen.push(digits);
            candidates.push(cell);
        }
    }
    candidates
}

fn select_phones<'a>(cells: &Cells<'a>, index: &DuplicateIndex) -> PhoneSelection<'a> {
    let candidates = phone_candidates(cells.row);
    let mut duplicates: Vec<String> = Vec::new();
    let mut note_duplicate = |value: &str| {
        let cleaned = clean_phone(value);
        if !duplicates.contains(&cleaned) {
            duplicates.push(cleaned);
        }
    };

    let usable_mapped = |field| {
        cells
            .get(field)
            .filter(|value| digits_only(value).len() >= MAPPED_PHONE_MIN_DIGITS)
    };

    let mut primary = None;
    if let Some(mapped) = usable_mapped(CanonicalField::PhoneNumber) {
        if index.has_phone(mapped) {
            note_duplicate(mapped);
        } else {
            primary = Some(mapped);
        }
    }
    for candidate in &candidates {
        if index.has_phone(candidate) {
            note_duplicate(candidate);
        } else if primary.is_none() {
            primary = Some(*candidate);
        }
    }

    let primary_key = primary.map(national_key);
    let distinct = |value: &str| primary_key.as_deref() != Some(national_key(value).as_str());

    let secondary = usable_mapped(CanonicalField::SecondaryPhoneNumber)
        .filter(|value| !index.has_phone(value) && distinct(value))
        .or_else(|| {
            candidates
                .iter()
                .copied()
                .find(|value| !index.has_phone(value) && distinct(value))
        });

    PhoneSelection { primary, secondary, duplicates }
}

/// Calling code for the row, by priority: explicit `+` prefix on the phone,
/// mapped country-code column, digit-pattern heuristics, country name.
fn infer_country_code(cells: &Cells<'_>, phone: Option<&str>) -> Option<String> {
    if let Some((code, _)) = phone.and_then(split_explicit_prefix) {
        return Some(code);
    }
    if let Some(code) = cells.get(CanonicalField::PhoneCountryCode).and_then(normalize_code) {
        return Some(code);
    }
    if let Some((code, _)) = phone.and_then(|p| infer_from_digits(&digits_only(p))) {
        return Some(code);
    }
    cells
        .get(CanonicalField::Country)
        .and_then(code_for_country)
        .map(str::to_string)
}

// =============================================================================
// ASSIGNMENT & STATUS
// =============================================================================

/// Match a staff cell against the user directory: exact name, then exact
/// email, then (for values longer than 3 characters) name substring.
pub fn resolve_staff<'a>(value: &str, directory: &'a [DirectoryUser]) -> Option<&'a DirectoryUser> {
    let needle = value.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    directory
        .iter()
        .find(|user| user.name.to_lowercase() == needle)
        .or_else(|| directory.iter().find(|user| user.email.to_lowercase() == needle))
        .or_else(|| {
            (needle.chars().count() > 3)
                .then(|| directory.iter().find(|user| user.name.to_lowercase().contains(&needle)))
                .flatten()
        })
}

pub fn derive_status(raw: Option<&str>, staff_assigned: bool) -> LeadStatus {
    let raw = raw.map(|s| s.trim().to_lowercase()).unwrap_or_default();
    if staff_assigned && (raw.is_empty() || raw == "unassigned") {
        return LeadStatus::Assigned;
    }

    let matched = if raw.contains("follow") {
        Some(LeadStatus::FollowUp)
    } else if raw.contains("prospect") {
        Some(LeadStatus::Prospect)
    } else if raw.contains("eligible") {
        Some(LeadStatus::NotEligible)
    } else if raw.contains("interested") {
        Some(LeadStatus::NotInterested)
    } else if raw.contains("completed") {
        Some(LeadStatus::RegistrationCompleted)
    } else {
        None
    };

    match matched {
        Some(status) => status,
        None if staff_assigned => LeadStatus::Assigned,
        None => LeadStatus::Unassigned,
    }
}

// =============================================================================
// DATES
// =============================================================================

/// Parse a follow-up date cell; unparseable values are `None`, not errors.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(serial) = value.parse::<f64>() {
        if !SERIAL_DATE_RANGE.contains(&serial) {
            return None;
        }
        let millis = ((serial - SERIAL_UNIX_OFFSET) * 86_400.0 * 1_000.0) as i64;
        return DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive());
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
}

// =============================================================================
// LIMITS
// =============================================================================

fn check_lengths(lead: &NormalizedLead) -> Result<(), RowError> {
    let short_fields: [(&'static str, Option<&str>); 15] = [
        ("name", Some(lead.name.as_str())),
        ("first_name", lead.first_name.as_deref()),
        ("last_name", lead.last_name.as_deref()),
        ("phone_number", lead.phone_number.as_deref()),
        ("phone_country_code", lead.phone_country_code.as_deref()),
        ("whatsapp_number", lead.whatsapp_number.as_deref()),
        ("secondary_phone_number", lead.secondary_phone_number.as_deref()),
        ("email", lead.email.as_deref()),
        ("country", lead.country.as_deref()),
        ("program", lead.program.as_deref()),
        ("occupation", lead.occupation.as_deref()),
        ("source", Some(lead.source.as_str())),
        ("priority", Some(lead.priority.as_str())),
        ("follow_up_status", Some(lead.follow_up_status.as_str())),
        ("ielts_score", lead.ielts_score.as_deref()),
    ];
    for (field, value) in short_fields {
        check_length(field, value, SHORT_TEXT_LIMIT)?;
    }
    check_length("comment", lead.comment.as_deref(), COMMENT_LIMIT)
}

fn check_length(field: &'static str, value: Option<&str>, limit: usize) -> Result<(), RowError> {
    let length = value.map_or(0, |v| v.chars().count());
    if length > limit {
        return Err(RowError::TooLong { field, length, limit });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lead_import::header::resolve_columns;
    use crate::types::ExistingContacts;

    fn row(cells: &[&str]) -> RawRow {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn mapping(headers: &[&str]) -> ColumnMapping {
        resolve_columns(&headers.iter().map(|h| h.to_string()).collect::<Vec<_>>())
    }

    fn directory() -> Vec<DirectoryUser> {
        vec![
            DirectoryUser {
                id: Uuid::from_u128(1),
                name: "Priya Sharma".to_string(),
                email: "priya@consult.in".to_string(),
                role: "SALES_TEAM".to_string(),
            },
            DirectoryUser {
                id: Uuid::from_u128(2),
                name: "Arjun Mehta".to_string(),
                email: "arjun@consult.in".to_string(),
                role: "SALES_TEAM_HEAD".to_string(),
            },
        ]
    }

    fn accept(outcome: Result<RowOutcome, RowError>) -> NormalizedLead {
        match outcome {
            Ok(RowOutcome::Accepted(lead)) => *lead,
            other => panic!("expected accepted row, got {other:?}"),
        }
    }

    fn run(headers: &[&str], cells: &[&str], index: &mut DuplicateIndex) -> Result<RowOutcome, RowError> {
        let users = directory();
        let ctx = RowContext { directory: &users, created_by: Uuid::from_u128(9), now: Utc::now() };
        normalize_row(&row(cells), 2, &mapping(headers), &ctx, index)
    }

    #[test]
    fn test_basic_row() {
        let mut index = DuplicateIndex::default();
        let lead = accept(run(&["Name", "Phone", "Email"], &["Jane Doe", "9876543210", "Jane@X.com"], &mut index));
        assert_eq!(lead.name, "Jane Doe");
        assert_eq!(lead.phone_number.as_deref(), Some("9876543210"));
        assert_eq!(lead.phone_country_code.as_deref(), Some("+91"));
        assert_eq!(lead.email.as_deref(), Some("jane@x.com"));
        assert_eq!(lead.status, LeadStatus::Unassigned);
        assert_eq!(lead.source, DEFAULT_SOURCE);
        assert_eq!(lead.created_by, Uuid::from_u128(9));
        assert!(index.has_phone("9876543210"));
        assert!(index.has_email("jane@x.com"));
    }

    #[test]
    fn test_uae_number_is_split() {
        let mut index = DuplicateIndex::default();
        let lead = accept(run(&["Name", "Phone"], &["Omar", "+971501234567"], &mut index));
        assert_eq!(lead.phone_number.as_deref(), Some("501234567"));
        assert_eq!(lead.phone_country_code.as_deref(), Some("+971"));
    }

    #[test]
    fn test_country_column_fallback() {
        let mut index = DuplicateIndex::default();
        let lead = accept(run(&["Name", "Phone", "Country"], &["Sara", "501234567", "UAE"], &mut index));
        assert_eq!(lead.phone_country_code.as_deref(), Some("+971"));
        assert_eq!(lead.phone_number.as_deref(), Some("501234567"));
    }

    #[test]
    fn test_country_code_column_beats_digit_heuristics() {
        let mut index = DuplicateIndex::default();
        let lead = accept(run(&["Name", "Country Code", "Phone"], &["Tom", "44", "7911123456"], &mut index));
        assert_eq!(lead.phone_country_code.as_deref(), Some("+44"));
        assert_eq!(lead.phone_number.as_deref(), Some("7911123456"));
    }

    #[test]
    fn test_name_falls_back_to_first_column() {
        let mut index = DuplicateIndex::default();
        let lead = accept(run(&["Sr", "Name", "Phone"], &["+_ROHIT_+", "", "9876543210"], &mut index));
        assert_eq!(lead.name, "ROHIT");
    }

    #[test]
    fn test_unusable_name_falls_back_to_original_then_placeholder() {
        let mut index = DuplicateIndex::default();
        let lead = accept(run(&["Phone", "Name"], &["", "___"], &mut index));
        assert_eq!(lead.name, "___");
        let lead = accept(run(&["Phone", "Name"], &["", ""], &mut index));
        assert_eq!(lead.name, "Row 2");
    }

    #[test]
    fn test_first_and_last_name_are_joined() {
        let mut index = DuplicateIndex::default();
        let lead = accept(run(&["First Name", "Last Name", "Mobile"], &["Anita", "Rao", "9123456780"], &mut index));
        assert_eq!(lead.name, "Anita Rao");
        assert_eq!(lead.first_name.as_deref(), Some("Anita"));
        assert_eq!(lead.last_name.as_deref(), Some("Rao"));
    }

    #[test]
    fn test_duplicate_email_skips_row_even_with_new_phone() {
        let mut index = DuplicateIndex::seeded(&ExistingContacts {
            phones: vec![],
            emails: vec!["jane@x.com".to_string()],
        });
        let outcome = run(&["Name", "Phone", "Email"], &["Jane", "9000000001", "JANE@x.com"], &mut index).unwrap();
        assert!(matches!(outcome, RowOutcome::Skipped(ref reason) if reason == "Email already in CRM"));
        assert!(!index.has_phone("9000000001"));
    }

    #[test]
    fn test_all_candidates_duplicate_skips_row() {
        let mut index = DuplicateIndex::seeded(&ExistingContacts {
            phones: vec!["9876543210".to_string(), "9123456789".to_string()],
            emails: vec![],
        });
        let outcome = run(&["Name", "Phone", "Notes"], &["Jane", "+91 9876543210", "alt 9123456789"], &mut index).unwrap();
        match outcome {
            RowOutcome::Skipped(reason) => {
                assert!(reason.contains("+919876543210"), "{reason}");
                assert!(reason.contains("9123456789"), "{reason}");
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_mapped_phone_falls_back_to_other_candidate() {
        let mut index = DuplicateIndex::seeded(&ExistingContacts {
            phones: vec!["9876543210".to_string()],
            emails: vec![],
        });
        let lead = accept(run(&["Name", "Phone", "Alt"], &["Jane", "9876543210", "9123456789"], &mut index));
        assert_eq!(lead.phone_number.as_deref(), Some("9123456789"));
        assert_eq!(lead.secondary_phone_number, None);
    }

    #[test]
    fn test_row_without_any_phone_is_accepted() {
        let mut index = DuplicateIndex::default();
        let lead = accept(run(&["Name", "Email"], &["Walk-in", "walkin@x.com"], &mut index));
        assert_eq!(lead.phone_number, None);
        assert_eq!(lead.phone_country_code, None);
    }

    #[test]
    fn test_noise_cells_are_not_phone_candidates() {
        let mut index = DuplicateIndex::default();
        let lead = accept(run(
            &["Name", "Qualification"],
            &["Ravi", "Qualification 2019-2023 score 8123456789"],
            &mut index,
        ));
        assert_eq!(lead.phone_number, None);
    }

    #[test]
    fn test_secondary_phone_from_mapped_column() {
        let mut index = DuplicateIndex::default();
        let lead = accept(run(
            &["Name", "Phone", "Alternate Number"],
            &["Meera", "9876543210", "+91 9123456789"],
            &mut index,
        ));
        assert_eq!(lead.phone_number.as_deref(), Some("9876543210"));
        assert_eq!(lead.secondary_phone_number.as_deref(), Some("+919123456789"));
        assert!(index.has_phone("9123456789"));
    }

    #[test]
    fn test_secondary_equal_to_primary_is_dropped() {
        let mut index = DuplicateIndex::default();
        let lead = accept(run(
            &["Name", "Phone", "Alternate Number"],
            &["Meera", "9876543210", "919876543210"],
            &mut index,
        ));
        assert_eq!(lead.secondary_phone_number, None);
    }

    #[test]
    fn test_staff_assignment_sets_status() {
        let mut index = DuplicateIndex::default();
        let lead = accept(run(&["Name", "Phone", "Assigned To"], &["Kiran", "9876543210", "priya sharma"], &mut index));
        assert_eq!(lead.assigned_staff_id, Some(Uuid::from_u128(1)));
        assert_eq!(lead.status, LeadStatus::Assigned);
    }

    #[test]
    fn test_resolve_staff_by_email_and_substring() {
        let users = directory();
        assert_eq!(resolve_staff("ARJUN@consult.in", &users).map(|u| u.id), Some(Uuid::from_u128(2)));
        assert_eq!(resolve_staff("mehta", &users).map(|u| u.id), Some(Uuid::from_u128(2)));
        assert!(resolve_staff("arj", &users).is_none());
        assert!(resolve_staff("nobody", &users).is_none());
    }

    #[test]
    fn test_derive_status() {
        assert_eq!(derive_status(None, true), LeadStatus::Assigned);
        assert_eq!(derive_status(Some("Unassigned"), true), LeadStatus::Assigned);
        assert_eq!(derive_status(Some("Follow up later"), true), LeadStatus::FollowUp);
        assert_eq!(derive_status(Some("PROSPECT"), false), LeadStatus::Prospect);
        assert_eq!(derive_status(Some("not eligible"), false), LeadStatus::NotEligible);
        assert_eq!(derive_status(Some("Not Interested"), false), LeadStatus::NotInterested);
        assert_eq!(derive_status(Some("registration completed"), false), LeadStatus::RegistrationCompleted);
        // "New" is not an import keyword; staff decides between the defaults
        assert_eq!(derive_status(Some("New"), false), LeadStatus::Unassigned);
        assert_eq!(derive_status(Some("New"), true), LeadStatus::Assigned);
        assert_eq!(derive_status(Some("hot"), false), LeadStatus::Unassigned);
        assert_eq!(derive_status(None, false), LeadStatus::Unassigned);
    }

    #[test]
    fn test_parse_date_serial_and_text() {
        assert_eq!(parse_date("45292"), NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(parse_date("45292.75"), NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(parse_date("2024-03-15"), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(parse_date("15/03/2024"), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(parse_date("15 Mar 2024"), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(parse_date("2024-03-15T10:30:00Z"), NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(parse_date("9876543210"), None);
        assert_eq!(parse_date("next week"), None);
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("  *@John_ "), "John");
        assert_eq!(clean_name("\"(Asha Verma)\""), "Asha Verma");
        assert_eq!(clean_name("___"), "");
    }

    #[test]
    fn test_overlong_value_is_row_error() {
        let mut index = DuplicateIndex::default();
        let long_program = "x".repeat(300);
        let err = run(&["Name", "Phone", "Program"], &["Jane", "9876543210", &long_program], &mut index).unwrap_err();
        assert_eq!(err, RowError::TooLong { field: "program", length: 300, limit: 255 });
        assert!(!index.has_phone("9876543210"));
    }

    #[test]
    fn test_follow_up_and_defaults() {
        let mut index = DuplicateIndex::default();
        let lead = accept(run(
            &["Name", "Phone", "Follow Up Date", "Priority", "Lead Source"],
            &["Jane", "9876543210", "2024-05-01", "High", "Instagram"],
            &mut index,
        ));
        assert_eq!(lead.follow_up_date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(lead.priority, "High");
        assert_eq!(lead.source, "Instagram");
        assert_eq!(lead.follow_up_status, DEFAULT_FOLLOW_UP_STATUS);
    }
}
