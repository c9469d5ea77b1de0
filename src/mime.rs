//! MIME content normalization
//!
//! Pure transforms from raw server payloads to displayable content: no
//! I/O, no persistence, best-effort on malformed input. Multipart bodies
//! are walked by recursive descent over boundary-delimited slices — the
//! boundary split is the control structure, string matching is only used
//! for scalar header fields.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::collections::HashMap;

/// Decode a quoted-printable payload to text.
///
/// Decodes `=XX` escapes and soft line breaks, then interprets the bytes
/// as UTF-8 with a Latin-1 fallback on invalid sequences. Never fails on
/// malformed input — undecodable escapes pass through as-is.
#[must_use]
pub fn decode_quoted_printable(raw: &[u8]) -> String {
    let bytes = quoted_printable::decode(raw, quoted_printable::ParseMode::Robust)
        .unwrap_or_else(|_| raw.to_vec());
    text_from_bytes(&bytes)
}

/// UTF-8 with Latin-1 fallback.
///
/// Server payloads occasionally declare UTF-8 but carry Latin-1 bytes;
/// mapping each byte to its code point recovers readable text instead of
/// replacement characters.
fn text_from_bytes(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec())
        .unwrap_or_else(|_| bytes.iter().map(|&b| char::from(b)).collect())
}

/// A single MIME entity: parsed headers plus the raw body slice.
struct Part<'a> {
    headers: Vec<(String, String)>,
    body: &'a [u8],
}

impl<'a> Part<'a> {
    /// Split a raw entity at the first blank line, unfolding header
    /// continuation lines (RFC 2822 folding).
    fn parse(raw: &'a [u8]) -> Self {
        let (head, body) = split_head_body(raw);
        let mut headers: Vec<(String, String)> = Vec::new();
        for line in head.split(|&b| b == b'\n') {
            let line = trim_cr(line);
            if line.is_empty() {
                continue;
            }
            if line[0] == b' ' || line[0] == b'\t' {
                // Continuation of the previous header.
                if let Some(last) = headers.last_mut() {
                    last.1.push(' ');
                    last.1.push_str(text_from_bytes(line).trim());
                }
                continue;
            }
            let text = text_from_bytes(line);
            if let Some((name, value)) = text.split_once(':') {
                headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }
        Self { headers, body }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Media type without parameters, lowercased. Missing header defaults
    /// to `text/plain` per RFC 2045.
    fn media_type(&self) -> String {
        self.header("content-type")
            .map_or("text/plain", |v| v.split(';').next().unwrap_or(""))
            .trim()
            .to_ascii_lowercase()
    }

    fn boundary(&self) -> Option<String> {
        self.header("content-type").and_then(parameter_of)
    }

    /// Body bytes after undoing the transfer encoding.
    fn decoded_bytes(&self) -> Vec<u8> {
        match self
            .header("content-transfer-encoding")
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "quoted-printable" => {
                quoted_printable::decode(self.body, quoted_printable::ParseMode::Robust)
                    .unwrap_or_else(|_| self.body.to_vec())
            }
            "base64" => {
                let cleaned: Vec<u8> = self
                    .body
                    .iter()
                    .filter(|b| !b.is_ascii_whitespace())
                    .copied()
                    .collect();
                BASE64.decode(&cleaned).unwrap_or_else(|_| self.body.to_vec())
            }
            _ => self.body.to_vec(),
        }
    }

    fn decoded_text(&self) -> String {
        text_from_bytes(&self.decoded_bytes())
    }
}

/// Extract the `boundary=` parameter from a Content-Type value.
fn parameter_of(content_type: &str) -> Option<String> {
    for param in content_type.split(';').skip(1) {
        let param = param.trim();
        if let Some(value) = param
            .strip_prefix("boundary=")
            .or_else(|| param.strip_prefix("BOUNDARY="))
            .or_else(|| param.strip_prefix("Boundary="))
        {
            return Some(value.trim_matches('"').to_string());
        }
    }
    None
}

/// Split an entity into its header block and body at the first blank line.
fn split_head_body(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut i = 0;
    while i < raw.len() {
        // Blank line: \n\n or \n\r\n.
        if raw[i] == b'\n' {
            if raw.get(i + 1) == Some(&b'\n') {
                return (&raw[..i], &raw[i + 2..]);
            }
            if raw.get(i + 1) == Some(&b'\r') && raw.get(i + 2) == Some(&b'\n') {
                return (&raw[..i], &raw[i + 3..]);
            }
        }
        i += 1;
    }
    // No blank line: headers only, empty body.
    (raw, &[])
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Split a multipart body into its child entities.
///
/// Children are the slices between `--boundary` delimiter lines; the
/// closing `--boundary--` line (and any epilogue) ends the walk. A body
/// missing its boundary markers yields no children, and callers degrade
/// to the raw text.
fn split_parts<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    let mut current_start: Option<usize> = None;

    let mut line_start = 0;
    while line_start <= body.len() {
        let line_end = body[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |p| line_start + p);
        let line = trim_cr(&body[line_start..line_end]);

        let is_delimiter = line.starts_with(delimiter.as_bytes());
        if is_delimiter {
            if let Some(start) = current_start.take() {
                // Part content ends before this delimiter line, minus the
                // CRLF that introduced it.
                let mut end = line_start;
                if end > start && body[end - 1] == b'\n' {
                    end -= 1;
                    if end > start && body[end - 1] == b'\r' {
                        end -= 1;
                    }
                }
                parts.push(&body[start..end]);
            }
            let is_closing = line
                .strip_prefix(delimiter.as_bytes())
                .is_some_and(|rest| rest.starts_with(b"--"));
            if is_closing {
                return parts;
            }
            current_start = Some(line_end + 1);
        }

        if line_end >= body.len() {
            break;
        }
        line_start = line_end + 1;
    }

    // Unterminated multipart: take what we have.
    if let Some(start) = current_start {
        if start <= body.len() {
            parts.push(&body[start..]);
        }
    }
    parts
}

/// Locate a MIME part by media type inside a (possibly nested) multipart
/// body and return its decoded text.
///
/// Recurses into `multipart/*` children; the first matching leaf wins.
/// A non-multipart entity matches directly when its declared type equals
/// `media_type`.
#[must_use]
pub fn extract_part(mime: &[u8], media_type: &str) -> Option<String> {
    extract_from_part(&Part::parse(mime), media_type)
}

fn extract_from_part(part: &Part<'_>, media_type: &str) -> Option<String> {
    let declared = part.media_type();
    if declared == media_type {
        return Some(part.decoded_text());
    }
    if declared.starts_with("multipart/") {
        let boundary = part.boundary()?;
        for child in split_parts(part.body, &boundary) {
            if let Some(found) = extract_from_part(&Part::parse(child), media_type) {
                return Some(found);
            }
        }
    }
    None
}

/// Best displayable HTML for a MIME message.
///
/// Prefers a `text/html` part; falls back to `text/plain` converted by
/// escaping markup characters and replacing newlines with `<br>`. Returns
/// `None` when neither part exists, so callers can show the raw cleaned
/// text instead of failing the item load.
#[must_use]
pub fn html_body(mime: &[u8]) -> Option<String> {
    extract_part(mime, "text/html").or_else(|| {
        extract_part(mime, "text/plain").map(|plain| plain_to_html(&plain))
    })
}

fn plain_to_html(plain: &str) -> String {
    let escaped = plain
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    escaped.replace("\r\n", "<br>").replace('\n', "<br>")
}

/// Collect inline images from a MIME message, keyed by Content-Id.
///
/// Tries the structured multipart walk first; when that yields nothing
/// (some servers emit bodies whose boundary headers are stripped), falls
/// back to [`scan_inline_images`].
#[must_use]
pub fn inline_images(mime: &[u8]) -> HashMap<String, String> {
    let structured = extract_inline_images(mime);
    if structured.is_empty() {
        scan_inline_images(mime)
    } else {
        structured
    }
}

/// Structured inline-image extraction: the same recursive multipart walk
/// as [`extract_part`], selecting `image/*` parts carrying a `Content-Id`
/// header. Each image is re-encoded as a `data:` URL tagged with its
/// declared content type; angle brackets around the id are stripped.
#[must_use]
pub fn extract_inline_images(mime: &[u8]) -> HashMap<String, String> {
    let mut images = HashMap::new();
    collect_images(&Part::parse(mime), &mut images);
    images
}

fn collect_images(part: &Part<'_>, images: &mut HashMap<String, String>) {
    let declared = part.media_type();
    if declared.starts_with("multipart/") {
        if let Some(boundary) = part.boundary() {
            for child in split_parts(part.body, &boundary) {
                collect_images(&Part::parse(child), images);
            }
        }
        return;
    }
    if !declared.starts_with("image/") {
        return;
    }
    let Some(content_id) = part.header("content-id") else {
        return;
    };
    let key = content_id.trim().trim_matches(['<', '>']).to_string();
    let url = format!("data:{declared};base64,{}", BASE64.encode(part.decoded_bytes()));
    images.insert(key, url);
}

/// Loose fallback scan for inline images when multipart parsing yields
/// nothing: walks the raw text line by line, pairing each `Content-Id`
/// header with the base64 run that follows its header block.
#[must_use]
pub fn scan_inline_images(raw: &[u8]) -> HashMap<String, String> {
    let text = text_from_bytes(raw);
    let mut images = HashMap::new();

    let mut content_id: Option<String> = None;
    let mut content_type = String::from("image/png");
    let mut in_body = false;
    let mut b64 = String::new();

    let mut flush = |id: &mut Option<String>, ct: &str, b64: &mut String, images: &mut HashMap<String, String>| {
        if let Some(id) = id.take() {
            if !b64.is_empty() && BASE64.decode(b64.as_bytes()).is_ok() {
                images.insert(id, format!("data:{ct};base64,{b64}"));
            }
        }
        b64.clear();
    };

    for line in text.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("content-id:") {
            flush(&mut content_id, &content_type, &mut b64, &mut images);
            // Same byte length as the lowercased copy, so the slice is safe.
            let original = trimmed["content-id:".len()..].trim();
            content_id = Some(original.trim_matches(['<', '>']).to_string());
            in_body = false;
        } else if let Some(value) = lower.strip_prefix("content-type:") {
            content_type = value.split(';').next().unwrap_or("image/png").trim().to_string();
            in_body = false;
        } else if trimmed.is_empty() {
            in_body = content_id.is_some();
        } else if in_body && is_base64_line(trimmed) {
            b64.push_str(trimmed);
        } else if in_body {
            flush(&mut content_id, &content_type, &mut b64, &mut images);
            in_body = false;
        }
    }
    flush(&mut content_id, &content_type, &mut b64, &mut images);
    images
}

fn is_base64_line(line: &str) -> bool {
    !line.is_empty()
        && line
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}

/// Whether the message's top-level headers ask for a read receipt
/// (`Disposition-Notification-To`, RFC 8098).
#[must_use]
pub fn requests_read_receipt(mime: &[u8]) -> bool {
    Part::parse(mime)
        .header("disposition-notification-to")
        .is_some()
}

/// Strip boundary remnants some servers leave in already-flattened
/// bodies: lines that consist only of a `--`-prefixed separator token.
#[must_use]
pub fn strip_separators(text: &str) -> String {
    text.lines()
        .filter(|line| !is_separator_line(line.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_separator_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("--") else {
        return false;
    };
    rest.len() >= 4
        && rest
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'=' | b'.' | b'+'))
}
