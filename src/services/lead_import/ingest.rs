//! Upload decoding: turns raw file bytes into sheets of raw rows.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use tracing::{debug, warn};

use crate::error::ImportError;
use crate::types::{RawRow, Sheet};

use super::workbook::read_workbook;

/// Name given to the single table of a delimited file
pub const DELIMITED_SHEET_NAME: &str = "CSV";

const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Replacement-character share above which UTF-8 is abandoned for Windows-1252
const MAX_REPLACEMENTS: usize = 50;
const MAX_REPLACEMENT_PERCENT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Workbook,
    Delimited,
}

/// Classify an upload by its filename extension.
pub fn file_kind(filename: &str) -> Result<FileKind, ImportError> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xlsm" => Ok(FileKind::Workbook),
        "csv" | "txt" => Ok(FileKind::Delimited),
        "xls" => Err(ImportError::validation(
            "Legacy .xls workbooks are not supported, save the file as .xlsx or .csv",
        )),
        "" => Err(ImportError::validation("File has no extension, expected .xlsx or .csv")),
        other => Err(ImportError::validation(format!(
            "Unsupported file type .{other}, expected .xlsx or .csv"
        ))),
    }
}

/// Decode an upload into sheets, dropping sheets whose lower-cased name
/// contains one of `excluded` and sheets without rows.
pub fn read_sheets(filename: &str, bytes: &[u8], excluded: &[String]) -> Result<Vec<Sheet>, ImportError> {
    if bytes.is_empty() {
        return Err(ImportError::validation("No file uploaded"));
    }

    let sheets = match file_kind(filename)? {
        FileKind::Workbook => read_workbook(bytes)?,
        FileKind::Delimited => vec![read_delimited(bytes)?],
    };

    let kept: Vec<Sheet> = sheets
        .into_iter()
        .filter(|sheet| {
            let skip = is_excluded(&sheet.name, excluded);
            if skip {
                debug!("Skipping excluded sheet '{}'", sheet.name);
            }
            !skip
        })
        .filter(|sheet| sheet.rows.iter().any(|row| !is_blank(row)))
        .collect();

    if kept.is_empty() {
        return Err(ImportError::validation("No data found in file"));
    }
    Ok(kept)
}

pub fn is_excluded(sheet_name: &str, excluded: &[String]) -> bool {
    let name = sheet_name.to_lowercase();
    excluded
        .iter()
        .map(|keyword| keyword.trim())
        .filter(|keyword| !keyword.is_empty())
        .any(|keyword| name.contains(&keyword.to_lowercase()))
}

pub fn is_blank(row: &RawRow) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

/// Decode delimited text: BOM-marked UTF-8/UTF-16 first, then UTF-8, falling
/// back to Windows-1252 when UTF-8 decoding is mostly garbage.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        return text.into_owned();
    }

    let (text, had_errors) = UTF_8.decode_without_bom_handling(bytes);
    if had_errors {
        let replacements = text.matches('\u{FFFD}').count();
        let length = text.chars().count().max(1);
        if replacements > MAX_REPLACEMENTS && replacements * 100 > length * MAX_REPLACEMENT_PERCENT {
            warn!("Upload is not UTF-8 ({} invalid sequences), decoding as Windows-1252", replacements);
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            return text.into_owned();
        }
    }
    text.into_owned()
}

/// Pick the delimiter that occurs most often, outside quotes, on the first
/// non-blank line. Commas win ties.
pub fn sniff_delimiter(text: &str) -> u8 {
    let Some(line) = text.lines().find(|line| !line.trim().is_empty()) else {
        return b',';
    };

    let mut counts = [0usize; DELIMITERS.len()];
    let mut quoted = false;
    for byte in line.bytes() {
        if byte == b'"' {
            quoted = !quoted;
        } else if !quoted {
            if let Some(i) = DELIMITERS.iter().position(|d| *d == byte) {
                counts[i] += 1;
            }
        }
    }

    let mut best = 0;
    for i in 1..DELIMITERS.len() {
        if counts[i] > counts[best] {
            best = i;
        }
    }
    DELIMITERS[best]
}

pub fn read_delimited(bytes: &[u8]) -> Result<Sheet, ImportError> {
    let text = decode_text(bytes);
    let delimiter = sniff_delimiter(&text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ImportError::validation(format!("Unreadable CSV: {e}")))?;
        rows.push(record.iter().map(str::to_string).collect::<RawRow>());
    }

    debug!("Read {} delimited rows (delimiter {:?})", rows.len(), delimiter as char);
    Ok(Sheet { name: DELIMITED_SHEET_NAME.to_string(), rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lead_import::workbook::fixtures;

    fn excluded() -> Vec<String> {
        ["old", "archive", "summary"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_file_kind() {
        assert_eq!(file_kind("leads.XLSX").unwrap(), FileKind::Workbook);
        assert_eq!(file_kind("leads.xlsm").unwrap(), FileKind::Workbook);
        assert_eq!(file_kind("march.leads.csv").unwrap(), FileKind::Delimited);
        assert_eq!(file_kind("leads.txt").unwrap(), FileKind::Delimited);
        assert!(matches!(file_kind("leads.xls"), Err(ImportError::Validation(_))));
        assert!(matches!(file_kind("leads.pdf"), Err(ImportError::Validation(_))));
        assert!(matches!(file_kind("leads"), Err(ImportError::Validation(_))));
    }

    #[test]
    fn test_empty_upload() {
        let err = read_sheets("leads.csv", b"", &excluded()).unwrap_err();
        assert_eq!(err.to_string(), "No file uploaded");
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("Name,Phone\nA,1\n"), b',');
        assert_eq!(sniff_delimiter("Name;Phone;Email\nA;1;a@x.com\n"), b';');
        assert_eq!(sniff_delimiter("Name\tPhone\nA\t1\n"), b'\t');
        assert_eq!(sniff_delimiter("Name\n"), b',');
        assert_eq!(sniff_delimiter("\n\"Doe, Jane\";\"Phone\"\n"), b';');
    }

    #[test]
    fn test_read_semicolon_csv_with_quotes() {
        let sheet = read_delimited("Name;Phone\n\"Doe; Jane\";9876543210\nRavi\n".as_bytes()).unwrap();
        assert_eq!(sheet.name, DELIMITED_SHEET_NAME);
        assert_eq!(sheet.rows[1], vec!["Doe; Jane", "9876543210"]);
        assert_eq!(sheet.rows[2], vec!["Ravi"]);
    }

    #[test]
    fn test_quoted_newline_and_escaped_quote_stay_in_one_field() {
        let text = "Name,Notes\n\"Jane\",\"line one\nline two \"\"quoted\"\"\"\nRavi,short\n";
        let sheet = read_delimited(text.as_bytes()).unwrap();
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[1], vec!["Jane", "line one\nline two \"quoted\""]);
        assert_eq!(sheet.rows[2], vec!["Ravi", "short"]);
    }

    #[test]
    fn test_decode_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("Name,Phone".as_bytes());
        assert_eq!(decode_text(&bytes), "Name,Phone");
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        let mut le = vec![0xFF, 0xFE];
        let mut be = vec![0xFE, 0xFF];
        for unit in "Név,Tel".encode_utf16() {
            le.extend_from_slice(&unit.to_le_bytes());
            be.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_text(&le), "Név,Tel");
        assert_eq!(decode_text(&be), "Név,Tel");
    }

    #[test]
    fn test_decode_windows_1252_fallback() {
        // 0xE9 is "é" in Windows-1252 and never valid on its own in UTF-8
        let mut bytes = Vec::new();
        for _ in 0..60 {
            bytes.extend_from_slice(b"Jos\xE9,");
        }
        let text = decode_text(&bytes);
        assert!(text.starts_with("José,José"));
        assert!(!text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_few_invalid_bytes_stay_utf8() {
        let text = decode_text(b"Name,Phone\nJos\xE9,9876543210\n");
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_sheet_exclusion_is_case_insensitive_substring() {
        assert!(is_excluded("Archive_Old", &excluded()));
        assert!(is_excluded("SUMMARY 2024", &excluded()));
        assert!(!is_excluded("Leads", &excluded()));
        assert!(!is_excluded("Leads", &[" ".to_string()]));
    }

    #[test]
    fn test_workbook_sheets_filtered() {
        let bytes = fixtures::xlsx(&[
            ("Leads", vec![vec!["Name", "Phone"], vec!["Asha", "9876543210"]]),
            ("Archive_Old", vec![vec!["Name"], vec!["Old"]]),
            ("Blank", vec![vec![""]]),
        ]);
        let sheets = read_sheets("leads.xlsx", &bytes, &excluded()).unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].name, "Leads");
    }

    #[test]
    fn test_only_excluded_sheets_is_no_data() {
        let bytes = fixtures::xlsx(&[("Old Leads", vec![vec!["Name"], vec!["Asha"]])]);
        let err = read_sheets("leads.xlsx", &bytes, &excluded()).unwrap_err();
        assert_eq!(err.to_string(), "No data found in file");
    }

    #[test]
    fn test_blank_csv_is_no_data() {
        let err = read_sheets("leads.csv", b"\n,,\n", &excluded()).unwrap_err();
        assert_eq!(err.to_string(), "No data found in file");
    }
}
