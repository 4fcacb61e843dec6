//! Header row detection and column-to-field mapping
//!
//! Lead sheets come from many hands, so the header row is searched for
//! rather than assumed, and each column label is resolved against a table of
//! synonyms per canonical field. Resolution runs three passes:
//!
//! 1. exact match, priority fields only
//! 2. exact match, all fields
//! 3. substring match in either direction, all fields
//!
//! Every pass only sees columns not claimed by an earlier one, so a column
//! ends up mapped to at most one field.

use std::collections::HashMap;

use tracing::debug;

use crate::types::RawRow;

/// How many leading rows are searched for a header
const HEADER_SCAN_ROWS: usize = 30;

/// Labels that identify a header row; two distinct hits are required.
const HEADER_KEYWORDS: &[&str] = &["name", "phone", "mobile", "contact", "email", "source", "status"];

/// Shortest label that may match inside a longer synonym during the fuzzy pass
const MIN_REVERSE_MATCH_LEN: usize = 3;

/// Normalized lead attribute a column can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Name,
    FirstName,
    LastName,
    PhoneNumber,
    PhoneCountryCode,
    SecondaryPhoneNumber,
    WhatsappNumber,
    Email,
    Country,
    Program,
    Occupation,
    Source,
    AssignedStaff,
    Comment,
    Status,
    Priority,
    FollowUpDate,
    FollowUpStatus,
    IeltsScore,
}

struct FieldRule {
    field: CanonicalField,
    synonyms: &'static [&'static str],
    excluded: &'static [&'static str],
}

const NAME_EXCLUDED: &[&str] = &[
    "phone", "mobile", "contact", "whatsapp", "source", "assigned", "staff", "id", "no",
    "remark", "comment", "details", "description", "message", "info", "age",
    "qualification", "score", "date",
];

const SECONDARY_PHONE_EXCLUDED: &[&str] = &["age", "qualification", "score", "date", "source", "status"];

/// Synonyms are written in compact form: lowercase, alphanumerics only.
const RULES: &[FieldRule] = &[
    FieldRule {
        field: CanonicalField::Name,
        synonyms: &[
            "name", "fullname", "studentname", "leadname", "clientname",
            "customername", "applicantname",
        ],
        excluded: NAME_EXCLUDED,
    },
    FieldRule {
        field: CanonicalField::FirstName,
        synonyms: &["firstname", "fname", "givenname"],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::LastName,
        synonyms: &["lastname", "lname", "surname", "familyname"],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::PhoneNumber,
        synonyms: &[
            "phone", "phonenumber", "phoneno", "mobile", "mobilenumber", "mobileno", "contact",
            "contactnumber", "contactno", "cell", "cellphone", "telephone", "tel",
        ],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::PhoneCountryCode,
        synonyms: &["countrycode", "phonecode", "dialcode", "isd", "isdcode", "callingcode"],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::SecondaryPhoneNumber,
        synonyms: &[
            "secondaryphone", "secondaryphonenumber", "secondarymobile", "secondarynumber",
            "alternatephone", "alternatenumber", "alternativenumber", "alternatemobile",
            "alternatecontact", "altphone", "altnumber", "phone2", "mobile2", "otherphone",
            "landline",
        ],
        excluded: SECONDARY_PHONE_EXCLUDED,
    },
    FieldRule {
        field: CanonicalField::WhatsappNumber,
        synonyms: &["whatsapp", "whatsappnumber", "whatsappno", "wanumber"],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::Email,
        synonyms: &["email", "emailid", "emailaddress", "mail", "mailid"],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::Country,
        synonyms: &[
            "country", "preferredcountry", "destination", "destinationcountry",
            "countryofinterest", "studydestination",
        ],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::Program,
        synonyms: &["program", "programme", "course", "coursename", "interestedcourse", "degree"],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::Occupation,
        synonyms: &["occupation", "profession", "job", "designation"],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::Source,
        synonyms: &["source", "leadsource", "sourceoflead", "channel", "medium", "platform", "campaign"],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::AssignedStaff,
        synonyms: &[
            "assignedto", "assignedstaff", "assigned", "staff", "counsellor", "counselor",
            "owner", "leadowner", "executive", "agent",
        ],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::Comment,
        synonyms: &[
            "comment", "comments", "remark", "remarks", "note", "notes", "description",
            "details", "message", "feedback",
        ],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::Status,
        synonyms: &["status", "leadstatus", "stage"],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::Priority,
        synonyms: &["priority", "leadpriority"],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::FollowUpDate,
        synonyms: &["followupdate", "followup", "nextfollowup", "nextfollowupdate", "callbackdate"],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::FollowUpStatus,
        synonyms: &["followupstatus"],
        excluded: &[],
    },
    FieldRule {
        field: CanonicalField::IeltsScore,
        synonyms: &["ielts", "ieltsscore", "ieltsband", "band", "englishscore"],
        excluded: &[],
    },
];

/// Fields resolved by the first, exact-match pass
const PRIORITY_FIELDS: &[CanonicalField] = &[
    CanonicalField::Name,
    CanonicalField::PhoneNumber,
    CanonicalField::PhoneCountryCode,
    CanonicalField::SecondaryPhoneNumber,
    CanonicalField::Email,
    CanonicalField::AssignedStaff,
    CanonicalField::Source,
    CanonicalField::Status,
    CanonicalField::Priority,
];

/// Canonical field to column index. A column belongs to at most one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    columns: HashMap<CanonicalField, usize>,
}

impl ColumnMapping {
    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn is_claimed(&self, column: usize) -> bool {
        self.columns.values().any(|&c| c == column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    fn assign(&mut self, field: CanonicalField, column: usize) {
        self.columns.insert(field, column);
    }

    /// Point the name at column 0, releasing whatever field held it.
    fn force_name_to_first_column(&mut self) {
        self.columns.retain(|_, column| *column != 0);
        self.columns.insert(CanonicalField::Name, 0);
    }
}

/// Header row location and the mapping derived from it
#[derive(Debug, Clone)]
pub struct HeaderInfo {
    /// Index of the header row within the sheet; data starts on the next row
    pub index: usize,
    pub labels: Vec<String>,
    pub mapping: ColumnMapping,
    /// False when no row looked like a header and row 0 was assumed
    pub detected: bool,
}

/// A column label in compact form: lowercase, alphanumerics only
struct HeaderKey {
    compact: String,
}

impl HeaderKey {
    fn new(label: &str) -> Self {
        Self { compact: compact(label) }
    }

    /// Exclusion keywords match anywhere in the compact label, so
    /// "Candidate Name" mentions "date" and "Mobile No." mentions "no".
    fn mentions(&self, keyword: &str) -> bool {
        self.compact.contains(keyword)
    }
}

fn compact(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Locate the header row of a sheet and map its columns.
///
/// Returns `None` for a sheet without rows.
pub fn infer_header(rows: &[RawRow]) -> Option<HeaderInfo> {
    let first = rows.first()?;

    let found = rows
        .iter()
        .take(HEADER_SCAN_ROWS)
        .position(|row| header_keyword_hits(row) >= 2);

    let (index, detected) = match found {
        Some(index) => (index, true),
        None => (0, false),
    };
    let source = if detected { &rows[index] } else { first };

    let labels: Vec<String> = source
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let label = cell.trim();
            if label.is_empty() {
                format!("Column {}", i + 1)
            } else {
                label.to_string()
            }
        })
        .collect();

    let mut mapping = resolve_columns(&labels);
    if !detected
        || !(mapping.contains(CanonicalField::Name) || mapping.contains(CanonicalField::FirstName))
    {
        mapping.force_name_to_first_column();
    }

    debug!(
        "Header row {} ({}): {} of {} columns mapped",
        index,
        if detected { "detected" } else { "assumed" },
        mapping.len(),
        labels.len()
    );

    Some(HeaderInfo { index, labels, mapping, detected })
}

fn header_keyword_hits(row: &RawRow) -> usize {
    let cells: Vec<String> = row.iter().map(|c| compact(c)).collect();
    HEADER_KEYWORDS
        .iter()
        .filter(|keyword| cells.iter().any(|cell| cell.contains(*keyword)))
        .count()
}

/// Resolve column labels to canonical fields using the three ordered passes.
pub fn resolve_columns(labels: &[String]) -> ColumnMapping {
    let keys: Vec<HeaderKey> = labels.iter().map(|l| HeaderKey::new(l)).collect();
    let priority: Vec<&FieldRule> = RULES
        .iter()
        .filter(|rule| PRIORITY_FIELDS.contains(&rule.field))
        .collect();
    let all: Vec<&FieldRule> = RULES.iter().collect();

    let mapping = claim(&priority, &keys, ColumnMapping::default(), exact_match);
    let mapping = claim(&all, &keys, mapping, exact_match);
    claim(&all, &keys, mapping, fuzzy_match)
}

fn exact_match(key: &HeaderKey, synonym: &str) -> bool {
    key.compact == synonym
}

fn fuzzy_match(key: &HeaderKey, synonym: &str) -> bool {
    !key.compact.is_empty()
        && (key.compact.contains(synonym)
            || (key.compact.len() >= MIN_REVERSE_MATCH_LEN && synonym.contains(key.compact.as_str())))
}

/// One resolution pass: each unresolved field claims the first unclaimed
/// column its matcher accepts.
fn claim(
    rules: &[&FieldRule],
    keys: &[HeaderKey],
    mut mapping: ColumnMapping,
    matches: fn(&HeaderKey, &str) -> bool,
) -> ColumnMapping {
    for rule in rules {
        if mapping.contains(rule.field) {
            continue;
        }
        let column = keys.iter().enumerate().position(|(column, key)| {
            !mapping.is_claimed(column)
                && rule.synonyms.iter().any(|synonym| matches(key, synonym))
                && !rule.excluded.iter().any(|keyword| key.mentions(keyword))
        });
        if let Some(column) = column {
            mapping.assign(rule.field, column);
        }
    }
    mapping
}
