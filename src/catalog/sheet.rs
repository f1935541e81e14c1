//! CSV sheet parsing and image link normalization.

use regex::Regex;
use std::sync::LazyLock;

use super::{CatalogError, CatalogItem};

/// `/d/<id>/view` share links.
static DRIVE_PATH_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/d/([a-zA-Z0-9_-]+)").unwrap());

/// `open?id=<id>` / `uc?id=<id>` links.
static DRIVE_QUERY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"id=([a-zA-Z0-9_-]+)").unwrap());

/// Rewrite a Google Drive share link to a direct Drive API download link.
/// API links and non-Drive links are returned unchanged.
pub fn convert_to_api_link(url: &str, api_key: &str) -> String {
    if url.is_empty() || url.contains("googleapis.com") || !url.contains("drive.google.com") {
        return url.to_string();
    }
    let id = DRIVE_PATH_ID_RE
        .captures(url)
        .or_else(|| DRIVE_QUERY_ID_RE.captures(url))
        .and_then(|c| c.get(1));
    match id {
        Some(id) => format!(
            "https://www.googleapis.com/drive/v3/files/{}?alt=media&key={api_key}",
            id.as_str()
        ),
        None => url.to_string(),
    }
}

/// Split CSV text into records. Handles quoted fields, doubled quotes and
/// CRLF line ends; blank lines are skipped.
pub fn parse_csv(text: &str) -> Result<Vec<Vec<String>>, CatalogError> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    let mut end_record = |record: &mut Vec<String>, field: &mut String| {
        record.push(std::mem::take(field));
        let blank = record.len() == 1 && record[0].trim().is_empty();
        let done = std::mem::take(record);
        if !blank {
            records.push(done);
        }
    };

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => end_record(&mut record, &mut field),
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err(CatalogError::Malformed("unterminated quoted field".into()));
    }
    if !field.is_empty() || !record.is_empty() {
        end_record(&mut record, &mut field);
    }
    Ok(records)
}

/// Parse a sheet with a header row into catalog items. Rows without a code
/// or an image are dropped.
pub fn parse_items(text: &str, api_key: &str) -> Result<Vec<CatalogItem>, CatalogError> {
    let records = parse_csv(text)?;
    let Some((header, rows)) = records.split_first() else {
        return Ok(Vec::new());
    };
    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
            .ok_or_else(|| CatalogError::Malformed(format!("missing '{name}' column")))
    };
    let code_col = column("code")?;
    let image_col = column("image")?;

    let items = rows
        .iter()
        .filter_map(|row| {
            let code = row.get(code_col).map(|s| s.trim()).unwrap_or("");
            let image = row.get(image_col).map(|s| s.trim()).unwrap_or("");
            if code.is_empty() || image.is_empty() {
                return None;
            }
            Some(CatalogItem::new(code, convert_to_api_link(image, api_key)))
        })
        .collect();
    Ok(items)
}
