//! `multipart/related` codec operating on raw bytes throughout (Design
//! Notes "Multipart parsing fidelity" — never round-trip DICOM payloads
//! through a text codec). Spec §4.3.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MultipartError {
    #[error("no boundary parameter in Content-Type")]
    MissingBoundary,
    #[error("malformed multipart body: {0}")]
    Malformed(String),
}

/// One parsed part: header lines verbatim (`name: value`, trimmed) and the
/// raw body bytes between the header block and the next boundary.
#[derive(Debug, Clone)]
pub struct Part {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Part {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Extracts the `boundary=` parameter from a `Content-Type` header value.
pub fn extract_boundary(content_type: &str) -> Result<String, MultipartError> {
    for segment in content_type.split(';').skip(1) {
        let segment = segment.trim();
        if let Some(rest) = segment.strip_prefix("boundary=") {
            let unquoted = rest.trim_matches('"');
            return Ok(unquoted.to_string());
        }
    }
    Err(MultipartError::MissingBoundary)
}

/// Splits `body` on `--{boundary}` delimiters, discarding the preamble and
/// the terminating `--{boundary}--`, and returns each remaining part.
pub fn parse(body: &[u8], boundary: &str) -> Result<Vec<Part>, MultipartError> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut sections = Vec::new();
    let mut search_from = 0usize;
    let mut starts = Vec::new();
    while let Some(pos) = find(&body[search_from..], delimiter) {
        starts.push(search_from + pos);
        search_from += pos + delimiter.len();
        if search_from >= body.len() {
            break;
        }
    }
    if starts.len() < 2 {
        return Err(MultipartError::Malformed(
            "fewer than two boundary delimiters found".to_string(),
        ));
    }

    for window in starts.windows(2) {
        let section_start = window[0] + delimiter.len();
        let section_end = window[1];
        if section_start >= section_end {
            continue;
        }
        let mut section = &body[section_start..section_end];

        if section.starts_with(b"--") {
            continue;
        }
        section = trim_leading_crlf(section);

        sections.push(parse_part(section)?);
    }

    Ok(sections)
}

fn parse_part(section: &[u8]) -> Result<Part, MultipartError> {
    let (header_end, sep_len) = find_header_body_split(section)
        .ok_or_else(|| MultipartError::Malformed("no header/body separator found".to_string()))?;
    let header_bytes = &section[..header_end];
    let mut body = section[header_end + sep_len..].to_vec();
    // The delimiter preceding the *next* boundary includes a trailing CRLF
    // that belongs to the boundary, not the body.
    if body.ends_with(b"\r\n") {
        body.truncate(body.len() - 2);
    } else if body.ends_with(b"\n") {
        body.truncate(body.len() - 1);
    }

    let header_str = String::from_utf8_lossy(header_bytes);
    let mut headers = Vec::new();
    for line in header_str.split("\r\n").flat_map(|l| l.split('\n')) {
        if line.trim().is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    Ok(Part { headers, body })
}

fn find_header_body_split(section: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = find(section, b"\r\n\r\n") {
        return Some((pos, 4));
    }
    find(section, b"\n\n").map(|pos| (pos, 2))
}

fn trim_leading_crlf(section: &[u8]) -> &[u8] {
    if let Some(rest) = section.strip_prefix(b"\r\n") {
        rest
    } else if let Some(rest) = section.strip_prefix(b"\n") {
        rest
    } else {
        section
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Generates a fresh boundary of the form `----DICOMBoundary<32 hex
/// chars>`, regenerating until it does not appear as a substring of any
/// part body (spec §4.3).
pub fn generate_boundary(parts: &[Vec<u8>]) -> String {
    loop {
        let candidate = format!("----DICOMBoundary{}", Uuid::new_v4().simple());
        let needle = candidate.as_bytes();
        if !parts.iter().any(|body| find(body, needle).is_some()) {
            return candidate;
        }
    }
}

/// Serialises `parts` (each `application/dicom` bytes) into a
/// `multipart/related` body using `boundary`.
pub fn emit(parts: &[Vec<u8>], boundary: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"\r\nContent-Type: application/dicom\r\n\r\n");
        out.extend_from_slice(part);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"--\r\n");
    out
}

/// The `Content-Type` value for a WADO-RS/STOW-RS multipart body.
pub fn content_type(boundary: &str) -> String {
    format!(r#"multipart/related; type="application/dicom"; boundary={boundary}"#)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_boundary_parameter() {
        let ct = r#"multipart/related; type="application/dicom"; boundary=abc123"#;
        assert_eq!(extract_boundary(ct).unwrap(), "abc123");
    }

    #[test]
    fn extracts_quoted_boundary() {
        let ct = r#"multipart/related; boundary="abc 123""#;
        assert_eq!(extract_boundary(ct).unwrap(), "abc 123");
    }

    #[test]
    fn missing_boundary_is_an_error() {
        assert!(extract_boundary("multipart/related").is_err());
    }

    #[test]
    fn round_trips_single_part_with_raw_bytes() {
        let payload = vec![0u8, 1, 2, 0xFF, 0xFE, b'\r', b'\n'];
        let emitted = emit(&[payload.clone()], "B");
        let parts = parse(&emitted, "B").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, payload);
        assert_eq!(parts[0].header("Content-Type"), Some("application/dicom"));
    }

    #[test]
    fn round_trips_multiple_parts() {
        let a = vec![1u8, 2, 3];
        let b = vec![4u8, 5, 6, 7];
        let emitted = emit(&[a.clone(), b.clone()], "BOUND");
        let parts = parse(&emitted, "BOUND").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].body, a);
        assert_eq!(parts[1].body, b);
    }

    #[test]
    fn generated_boundary_avoids_body_collision() {
        let boundary = generate_boundary(&[b"some body bytes".to_vec()]);
        assert!(boundary.starts_with("----DICOMBoundary"));
    }
}
