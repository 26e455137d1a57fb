//! Wire decoding for url-encoded and multipart form bodies.
//!
//! Produces a [`FormData`] payload: the raw multi-valued entry list in wire
//! order, with file parts kept as [`UploadedFile`]s and everything else as
//! text. Shaping into a kwarg value happens later, in the body decoder.
//!
//! Any failure here is client-caused and reported as a
//! [`ValidationError::BodyDecode`].

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use tracing::trace;

use crate::error::ValidationError;

// =============================================================================
// Payload Types
// =============================================================================

/// An uploaded file passed through resolution untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    filename: String,
    content_type: String,
    content: Vec<u8>,
}

impl UploadedFile {
    /// Creates a new uploaded file.
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            content,
        }
    }

    /// The client-supplied filename.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The part's content type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The file contents.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// The file size in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// One decoded form entry value.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    /// A plain text field.
    Text(String),
    /// A file part.
    File(UploadedFile),
}

/// The multi-valued form payload of one request.
///
/// Duplicate names are preserved in wire order; folding duplicates into
/// lists is the body decoder's job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry.
    pub fn push(&mut self, name: impl Into<String>, value: FormValue) {
        self.entries.push((name.into(), value));
    }

    /// Iterates entries in wire order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the payload holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// url-encoded Decoding
// =============================================================================

/// Decodes one percent-encoded form or query component.
///
/// `+` is a space. Returns `None` on invalid percent escapes or non-UTF-8
/// decoded bytes.
pub fn decode_component(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Parses an `application/x-www-form-urlencoded` body.
pub fn parse_urlencoded(body: &[u8]) -> Result<FormData, ValidationError> {
    let text = String::from_utf8_lossy(body);
    let mut form = FormData::new();
    for pair in text.split('&').filter(|pair| !pair.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = decode_component(name)
            .ok_or_else(|| ValidationError::body_decode("invalid encoding in form field name"))?;
        let value = decode_component(value)
            .ok_or_else(|| ValidationError::body_decode("invalid encoding in form field value"))?;
        form.push(name, FormValue::Text(value));
    }
    trace!(entries = form.len(), "parsed url-encoded body");
    Ok(form)
}

// =============================================================================
// multipart Decoding
// =============================================================================

/// Extracts the boundary parameter from a `multipart/form-data` Content-Type.
pub fn multipart_boundary(content_type: &str) -> Option<String> {
    for part in content_type.split(';').skip(1) {
        let part = part.trim();
        if let Some(boundary) = part.strip_prefix("boundary=") {
            let boundary = boundary.trim_matches('"');
            if !boundary.is_empty() {
                return Some(boundary.to_string());
            }
        }
    }
    None
}

/// Parses a `multipart/form-data` body into form entries.
///
/// Parts carrying a filename become [`UploadedFile`]s; every other part is a
/// text field (lossy UTF-8).
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<FormData, ValidationError> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut form = FormData::new();

    let mut pos = find_subslice(body, &delimiter, 0)
        .ok_or_else(|| ValidationError::body_decode("multipart boundary not found in body"))?;

    loop {
        let after = pos + delimiter.len();
        if body.len() >= after + 2 && body[after..after + 2] == *b"--" {
            break;
        }
        if body.len() < after + 2 || body[after..after + 2] != *b"\r\n" {
            return Err(ValidationError::body_decode("expected CRLF after multipart boundary"));
        }
        pos = after + 2;

        let (headers, data_start) = parse_part_headers(body, pos)?;
        let disposition = headers.get("content-disposition").ok_or_else(|| {
            ValidationError::body_decode("multipart part is missing Content-Disposition")
        })?;
        let (name, filename) = parse_content_disposition(disposition)?;

        let data_end = find_subslice(body, &delimiter, data_start)
            .ok_or_else(|| ValidationError::body_decode("unterminated multipart part"))?;
        // The CRLF before the next boundary belongs to the framing, not the data.
        let data = if data_end >= data_start + 2 && body[data_end - 2..data_end] == *b"\r\n" {
            &body[data_start..data_end - 2]
        } else {
            &body[data_start..data_end]
        };

        let value = match filename {
            Some(filename) => FormValue::File(UploadedFile::new(
                filename,
                headers
                    .get("content-type")
                    .cloned()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                data.to_vec(),
            )),
            None => FormValue::Text(String::from_utf8_lossy(data).into_owned()),
        };
        form.push(name, value);

        pos = data_end;
    }

    trace!(entries = form.len(), "parsed multipart body");
    Ok(form)
}

fn find_subslice(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if haystack.len() < needle.len() || start > haystack.len() - needle.len() {
        return None;
    }
    (start..=haystack.len() - needle.len()).find(|&i| haystack[i..].starts_with(needle))
}

/// Scans CRLF-terminated part headers; returns them lowercased along with
/// the offset of the first data byte.
fn parse_part_headers(
    body: &[u8],
    start: usize,
) -> Result<(IndexMap<String, String>, usize), ValidationError> {
    let mut headers = IndexMap::new();
    let mut pos = start;

    loop {
        let line_end = find_subslice(body, b"\r\n", pos)
            .ok_or_else(|| ValidationError::body_decode("unterminated multipart part headers"))?;
        let line = &body[pos..line_end];
        if line.is_empty() {
            return Ok((headers, line_end + 2));
        }
        let line = std::str::from_utf8(line)
            .map_err(|_| ValidationError::body_decode("invalid UTF-8 in multipart part header"))?;
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
        pos = line_end + 2;
    }
}

/// Parses `form-data; name="field"; filename="file.txt"`.
fn parse_content_disposition(
    value: &str,
) -> Result<(String, Option<String>), ValidationError> {
    let mut name = None;
    let mut filename = None;

    for part in value.split(';') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("name=") {
            name = Some(rest.trim_matches('"').to_string());
        } else if let Some(rest) = part.strip_prefix("filename=") {
            filename = Some(rest.trim_matches('"').to_string());
        }
    }

    match name {
        Some(name) => Ok((name, filename)),
        None => Err(ValidationError::body_decode(
            "multipart Content-Disposition is missing a field name",
        )),
    }
}
