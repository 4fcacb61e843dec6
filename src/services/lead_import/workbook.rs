//! Minimal OOXML (`.xlsx` / `.xlsm`) reader.
//!
//! Only cell values are read: shared strings, inline strings, booleans,
//! numbers and formula results. Cells are placed by their `r` reference so
//! sparse rows keep their column positions.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::ImportError;
use crate::types::{RawRow, Sheet};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Numbers at or above this magnitude are left as written
const MAX_INTEGRAL: f64 = 1e15;

/// Excel's sheet limits: 16384 columns (`XFD`) by 1048576 rows
const MAX_COLUMNS: usize = 16_384;
const MAX_ROWS: usize = 1_048_576;

/// Largest decompressed size accepted for a single part
const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

fn workbook_error(err: impl std::fmt::Display) -> ImportError {
    ImportError::Workbook(err.to_string())
}

/// Read every worksheet, in workbook order.
pub fn read_workbook(bytes: &[u8]) -> Result<Vec<Sheet>, ImportError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(workbook_error)?;

    let workbook = read_part(&mut archive, WORKBOOK_PART)?
        .ok_or_else(|| workbook_error("missing xl/workbook.xml"))?;
    let declared = parse_sheet_list(&workbook)?;

    let targets = match read_part(&mut archive, WORKBOOK_RELS_PART)? {
        Some(rels) => parse_relationships(&rels)?,
        None => HashMap::new(),
    };

    let shared = match read_part(&mut archive, SHARED_STRINGS_PART)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let mut sheets = Vec::with_capacity(declared.len());
    for (position, (name, rel_id)) in declared.into_iter().enumerate() {
        let path = targets
            .get(&rel_id)
            .map(|target| part_path(target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", position + 1));

        let Some(xml) = read_part(&mut archive, &path)? else {
            debug!("Sheet '{}' has no part at {}, skipping", name, path);
            continue;
        };
        let rows = parse_sheet(&xml, &shared)?;
        debug!("Read sheet '{}' ({} rows)", name, rows.len());
        sheets.push(Sheet { name, rows });
    }

    Ok(sheets)
}

fn read_part(archive: &mut Archive<'_>, name: &str) -> Result<Option<Vec<u8>>, ImportError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(workbook_error(err)),
    };
    if file.size() > MAX_PART_BYTES {
        return Err(part_too_large(name, MAX_PART_BYTES));
    }
    read_limited(&mut file, MAX_PART_BYTES, name).map(Some)
}

/// Read at most `limit` bytes; the declared size in a zip header is not trusted.
fn read_limited(reader: impl Read, limit: u64, name: &str) -> Result<Vec<u8>, ImportError> {
    let mut buf = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut buf)
        .map_err(workbook_error)?;
    if buf.len() as u64 > limit {
        return Err(part_too_large(name, limit));
    }
    Ok(buf)
}

fn part_too_large(name: &str, limit: u64) -> ImportError {
    workbook_error(format!("{name} expands beyond {limit} bytes"))
}

/// Relationship targets are relative to `xl/` unless absolute.
fn part_path(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else if target.starts_with("xl/") {
        target.to_string()
    } else {
        format!("xl/{target}")
    }
}

fn attribute(element: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>, ImportError> {
    for attr in element.attributes() {
        let attr = attr.map_err(workbook_error)?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value().map_err(workbook_error)?.into_owned()));
        }
    }
    Ok(None)
}

/// `(sheet name, relationship id)` pairs from `workbook.xml`
fn parse_sheet_list(xml: &[u8]) -> Result<Vec<(String, String)>, ImportError> {
    let mut reader = Reader::from_reader(xml);
    let mut sheets = Vec::new();
    loop {
        match reader.read_event().map_err(workbook_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attribute(&e, b"name")?.unwrap_or_default();
                let rel_id = attribute(&e, b"id")?.unwrap_or_default();
                sheets.push((name, rel_id));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, ImportError> {
    let mut reader = Reader::from_reader(xml);
    let mut targets = HashMap::new();
    loop {
        match reader.read_event().map_err(workbook_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id")?, attribute(&e, b"Target")?) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(targets)
}

/// Shared string table; rich-text runs are concatenated, phonetic hints dropped.
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, ImportError> {
    let mut reader = Reader::from_reader(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event().map_err(workbook_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text && !in_phonetic => {
                current.push_str(&t.unescape().map_err(workbook_error)?);
            }
            Event::CData(t) if in_text && !in_phonetic => {
                current.push_str(&String::from_utf8_lossy(&t));
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// Zero-based column index of a cell reference such as `AB12`.
///
/// `Ok(None)` when the reference has no column letters.
fn column_index(reference: &str) -> Result<Option<usize>, ImportError> {
    let mut index = 0usize;
    let mut seen = false;
    for c in reference.chars().take_while(|c| c.is_ascii_alphabetic()) {
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add(digit))
            .filter(|i| *i <= MAX_COLUMNS)
            .ok_or_else(|| workbook_error(format!("cell reference {reference} is beyond column XFD")))?;
        seen = true;
    }
    Ok(seen.then(|| index - 1))
}

/// One-based row number of a cell or row reference.
fn row_number(reference: &str) -> Result<Option<usize>, ImportError> {
    let Ok(number) = reference
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse::<usize>()
    else {
        return Ok(None);
    };
    if number > MAX_ROWS {
        return Err(workbook_error(format!("row {number} is beyond the sheet limit of {MAX_ROWS}")));
    }
    Ok(Some(number))
}

fn row_attribute(element: &BytesStart<'_>) -> Result<Option<usize>, ImportError> {
    match attribute(element, b"r")? {
        Some(reference) => row_number(&reference),
        None => Ok(None),
    }
}

/// Render a numeric cell: integral values lose the trailing `.0` and any
/// exponent, so phone numbers stored as numbers come back as plain digits.
fn render_number(raw: &str) -> String {
    let raw = raw.trim();
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < MAX_INTEGRAL => {
            format!("{}", n as i64)
        }
        _ => raw.to_string(),
    }
}

#[derive(Default)]
struct PendingCell {
    column: Option<usize>,
    kind: Option<String>,
    value: String,
}

impl PendingCell {
    fn resolve(self, shared: &[String]) -> String {
        match self.kind.as_deref() {
            Some("s") => self
                .value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| shared.get(i).cloned())
                .unwrap_or_default(),
            Some("b") => (if self.value.trim() == "1" { "TRUE" } else { "FALSE" }).to_string(),
            Some("str") | Some("inlineStr") | Some("e") => self.value,
            _ => render_number(&self.value),
        }
    }
}

fn place(row: &mut RawRow, column: usize, value: String) {
    if row.len() <= column {
        row.resize(column + 1, String::new());
    }
    row[column] = value;
}

fn parse_sheet(xml: &[u8], shared: &[String]) -> Result<Vec<RawRow>, ImportError> {
    let mut reader = Reader::from_reader(xml);
    let mut rows: Vec<RawRow> = Vec::new();
    let mut row: Option<RawRow> = None;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event().map_err(workbook_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    // Missing rows keep their place as blanks
                    if let Some(number) = row_attribute(&e)? {
                        while rows.len() + 1 < number {
                            rows.push(Vec::new());
                        }
                    }
                    row = Some(Vec::new());
                }
                b"c" => {
                    let column = match attribute(&e, b"r")? {
                        Some(reference) => column_index(&reference)?,
                        None => None,
                    };
                    cell = Some(PendingCell {
                        column,
                        kind: attribute(&e, b"t")?,
                        value: String::new(),
                    });
                }
                b"v" | b"t" => in_value = cell.is_some(),
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                if let Some(number) = row_attribute(&e)? {
                    while rows.len() < number {
                        rows.push(Vec::new());
                    }
                } else {
                    rows.push(Vec::new());
                }
            }
            Event::Text(t) if in_value && !in_phonetic => {
                if let Some(pending) = cell.as_mut() {
                    pending.value.push_str(&t.unescape().map_err(workbook_error)?);
                }
            }
            Event::CData(t) if in_value && !in_phonetic => {
                if let Some(pending) = cell.as_mut() {
                    pending.value.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"rPh" => in_phonetic = false,
                b"c" => {
                    if let (Some(pending), Some(current)) = (cell.take(), row.as_mut()) {
                        let column = pending.column.unwrap_or(current.len());
                        let value = pending.resolve(shared);
                        place(current, column, value);
                    }
                }
                b"row" => {
                    if let Some(finished) = row.take() {
                        rows.push(finished);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rows)
}
