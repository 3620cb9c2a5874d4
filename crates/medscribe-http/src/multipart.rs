//! `multipart/form-data` field extraction.
//!
//! Only the shape of the form matters for signing: each part's field name,
//! its text value, or for file parts its declared filename. File contents are
//! skipped without being copied. Works on the already-collected body bytes.

use medscribe_auth::body::FormField;

/// The body is not a well-formed multipart document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MultipartError {
    /// The boundary parameter is missing or empty.
    #[error("missing multipart boundary")]
    MissingBoundary,
    /// No delimiter line was found in the body.
    #[error("body contains no multipart delimiter")]
    NoDelimiter,
    /// A part has no blank line separating headers from content.
    #[error("multipart part {index} has no header terminator")]
    MalformedPart {
        /// Zero-based position of the part.
        index: usize,
    },
}

/// Parse a multipart body into its form fields, in document order.
///
/// A part without a `name` parameter is ignored. A part with a `filename`
/// parameter becomes a file field even if the filename is empty.
///
/// # Examples
///
/// ```
/// use medscribe_auth::body::FormField;
/// use medscribe_http::multipart::parse_form_fields;
///
/// let body = "--b\r\n\
///     Content-Disposition: form-data; name=\"title\"\r\n\r\n\
///     visit\r\n\
///     --b--\r\n";
/// let fields = parse_form_fields(body.as_bytes(), "b").unwrap();
/// assert_eq!(fields, vec![FormField::text("title", "visit")]);
/// ```
pub fn parse_form_fields(body: &[u8], boundary: &str) -> Result<Vec<FormField>, MultipartError> {
    if boundary.is_empty() {
        return Err(MultipartError::MissingBoundary);
    }
    let delimiter = format!("--{boundary}");
    let end_delimiter = format!("--{boundary}--");

    let parts = split_parts(body, delimiter.as_bytes(), end_delimiter.as_bytes())
        .ok_or(MultipartError::NoDelimiter)?;

    let mut fields = Vec::with_capacity(parts.len());
    for (index, part) in parts.into_iter().enumerate() {
        let (headers, content) =
            split_headers_body(part).ok_or(MultipartError::MalformedPart { index })?;
        let disposition = parse_content_disposition(headers);
        let Some(name) = disposition.name else {
            continue;
        };

        let field = match disposition.filename {
            Some(filename) => FormField::file(name, filename),
            None => FormField::text(name, String::from_utf8_lossy(content)),
        };
        fields.push(field);
    }

    Ok(fields)
}

/// Split the body into parts between delimiters.
///
/// Returns `None` when the opening delimiter is absent.
fn split_parts<'a>(body: &'a [u8], delimiter: &[u8], end_delimiter: &[u8]) -> Option<Vec<&'a [u8]>> {
    let start = find_bytes(body, delimiter)?;
    let mut parts = Vec::new();

    // The opening line itself may be the close delimiter: an empty form.
    if body[start..].starts_with(end_delimiter) {
        return Some(parts);
    }
    let mut remaining = skip_crlf(&body[start + delimiter.len()..]);

    loop {
        match find_bytes(remaining, delimiter) {
            Some(pos) => {
                parts.push(strip_trailing_crlf(&remaining[..pos]));
                let after = &remaining[pos..];
                if after.starts_with(end_delimiter) {
                    break;
                }
                remaining = skip_crlf(&after[delimiter.len()..]);
            }
            None => {
                // Unterminated document: keep what is left as the final part.
                let part = strip_trailing_crlf(remaining);
                if !part.is_empty() {
                    parts.push(part);
                }
                break;
            }
        }
    }

    Some(parts)
}

fn split_headers_body(part: &[u8]) -> Option<(&[u8], &[u8])> {
    let separator = b"\r\n\r\n";
    find_bytes(part, separator).map(|pos| (&part[..pos], &part[pos + separator.len()..]))
}

#[derive(Debug, Default)]
struct ContentDisposition {
    name: Option<String>,
    filename: Option<String>,
}

fn parse_content_disposition(headers: &[u8]) -> ContentDisposition {
    let headers = String::from_utf8_lossy(headers);
    let mut disposition = ContentDisposition::default();

    for line in headers.split("\r\n") {
        let Some((header, value)) = line.split_once(':') else {
            continue;
        };
        if !header.trim().eq_ignore_ascii_case("content-disposition") {
            continue;
        }
        // Parameters are matched by exact key so `filename` never satisfies `name`.
        for param in value.split(';').skip(1) {
            let Some((key, raw)) = param.split_once('=') else {
                continue;
            };
            let val = raw.trim().trim_matches('"').to_owned();
            match key.trim().to_ascii_lowercase().as_str() {
                "name" => disposition.name = Some(val),
                "filename" => disposition.filename = Some(val),
                _ => {}
            }
        }
    }

    disposition
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn skip_crlf(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\r\n").unwrap_or(data)
}

fn strip_trailing_crlf(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n").unwrap_or(data)
}
