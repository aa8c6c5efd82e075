use std::sync::OnceLock;

use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION};

use crate::{DownloadedFile, RawResponse};

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)filename(\*)?\s*=\s*(?:"([^"]*)"|([^;\s]+))"#)
            .expect("filename pattern must compile")
    })
}

/// Extracts the file name from a `content-disposition` header value.
///
/// Prefers the RFC 5987 `filename*=` form when both are present and it decodes.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut fallback = None;
    for captures in filename_pattern().captures_iter(value) {
        let Some(raw) = captures.get(2).or_else(|| captures.get(3)) else {
            continue;
        };
        let extended = captures.get(1).is_some();
        let name = if extended {
            match decode_extended(raw.as_str()) {
                Some(name) => name,
                None => continue,
            }
        } else {
            raw.as_str().to_owned()
        };
        if name.trim().is_empty() {
            continue;
        }
        if extended {
            return Some(name);
        }
        fallback.get_or_insert(name);
    }
    fallback
}

/// Decodes `charset'language'percent-encoded` (RFC 5987 `ext-value`).
fn decode_extended(raw: &str) -> Option<String> {
    let mut parts = raw.splitn(3, '\'');
    let (charset, encoded) = match (parts.next(), parts.next(), parts.next()) {
        (Some(charset), Some(_language), Some(encoded)) => (charset, encoded),
        _ => ("utf-8", raw),
    };
    let bytes = urlencoding::decode_binary(encoded.as_bytes());
    if charset.eq_ignore_ascii_case("iso-8859-1") {
        Some(bytes.iter().copied().map(char::from).collect())
    } else if charset.eq_ignore_ascii_case("utf-8") {
        String::from_utf8(bytes.into_owned()).ok()
    } else {
        None
    }
}

pub(crate) fn filename_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    filename_from_disposition(value)
}

pub(crate) fn into_downloaded_file(response: RawResponse) -> DownloadedFile {
    DownloadedFile {
        filename: filename_from_headers(&response.headers),
        blob: response.body,
    }
}
