//! Phone number cleanup and calling-code recognition

use once_cell::sync::Lazy;
use regex::Regex;

/// Calling codes recognised ahead of the generic `+NNN` prefix match.
const KNOWN_CODES: &[&str] = &["971", "91", "44", "1"];

pub const INDIA: &str = "+91";
pub const UAE: &str = "+971";

static EXPLICIT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+(\d{1,3})").expect("valid calling code regex"));

static INDIAN_MOBILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[6-9]\d{9}$").expect("valid mobile regex"));

pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Digits with a leading `+` kept when the value had one.
pub fn clean_phone(value: &str) -> String {
    let trimmed = value.trim();
    let digits = digits_only(trimmed);
    if trimmed.starts_with('+') && !digits.is_empty() {
        format!("+{digits}")
    } else {
        digits
    }
}

/// Split an explicit `+code` prefix off a phone value.
///
/// Returns the `+`-prefixed calling code and the remaining national digits.
pub fn split_explicit_prefix(value: &str) -> Option<(String, String)> {
    let trimmed = value.trim();
    if !trimmed.starts_with('+') {
        return None;
    }
    let digits = digits_only(trimmed);
    for code in KNOWN_CODES {
        if digits.len() > code.len() && digits.starts_with(code) {
            return Some((format!("+{code}"), digits[code.len()..].to_string()));
        }
    }
    let captures = EXPLICIT_PREFIX.captures(trimmed)?;
    let prefix = captures.get(0)?;
    let code = captures.get(1)?.as_str();
    Some((format!("+{code}"), digits_only(&trimmed[prefix.end()..])))
}

/// Infer a calling code from the shape of a bare digit string.
pub fn infer_from_digits(digits: &str) -> Option<(String, String)> {
    if digits.len() == 12 && digits.starts_with("91") {
        return Some((INDIA.to_string(), digits[2..].to_string()));
    }
    if digits.len() == 11 && digits.starts_with('0') {
        return Some((INDIA.to_string(), digits[1..].to_string()));
    }
    if INDIAN_MOBILE.is_match(digits) {
        return Some((INDIA.to_string(), digits.to_string()));
    }
    None
}

/// Calling code for a country name cell
pub fn code_for_country(country: &str) -> Option<&'static str> {
    let country = country.trim().to_lowercase();
    match country.as_str() {
        "india" | "in" => Some(INDIA),
        c if c == "uae" || c.contains("emirates") => Some(UAE),
        _ => None,
    }
}

/// Normalise a calling-code cell such as `91`, `0091` or `+971` to `+digits`.
pub fn normalize_code(value: &str) -> Option<String> {
    let digits = digits_only(value);
    let digits = digits.trim_start_matches('0');
    (!digits.is_empty() && digits.len() <= 4).then(|| format!("+{digits}"))
}

/// Key under which a number is tracked for duplicate detection.
///
/// Recognised country prefixes are removed so the same subscriber number
/// collides whether or not it was written with its calling code.
pub fn national_key(value: &str) -> String {
    if let Some((_, national)) = split_explicit_prefix(value) {
        return national;
    }
    let digits = digits_only(value);
    match infer_from_digits(&digits) {
        Some((_, national)) => national,
        None => digits,
    }
}
