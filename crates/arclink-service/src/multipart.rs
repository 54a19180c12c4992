//! Request-side multipart parsing for `mCreate` and multi-component
//! POST bodies.
//!
//! The SAP kernel frames each component as a `multipart/form-data` part
//! carrying `Content-Type`, `X-compId` and the component metadata headers.
//! This parser is deliberately strict about the boundary framing and
//! lenient about unknown headers.

use bytes::Bytes;

use arclink_core::{ArchiveError, ArchiveResult};

/// One parsed body part.
#[derive(Debug)]
pub struct BodyPart {
    headers: Vec<(String, String)>,
    /// Raw part bytes, without the framing.
    pub data: Bytes,
}

impl BodyPart {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Extracts the `boundary` parameter from a multipart Content-Type.
#[must_use]
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        Some(value.trim().trim_matches('"').to_string())
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|at| from + at)
}

/// Splits a multipart body into its parts.
///
/// # Errors
///
/// Returns a validation error when the delimiters or part headers are
/// malformed.
pub fn parse_multipart(body: &Bytes, boundary: &str) -> ArchiveResult<Vec<BodyPart>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut at = find(body, delimiter, 0)
        .ok_or_else(|| ArchiveError::validation("Malformed multipart body: missing boundary"))?;
    let mut parts = Vec::new();

    loop {
        at += delimiter.len();
        // Terminator: "--" after the delimiter.
        if body[at..].starts_with(b"--") {
            break;
        }
        if body[at..].starts_with(b"\r\n") {
            at += 2;
        }

        let headers_end = find(body, b"\r\n\r\n", at).ok_or_else(|| {
            ArchiveError::validation("Malformed multipart body: unterminated part headers")
        })?;
        let headers = parse_headers(&body[at..headers_end])?;
        let data_start = headers_end + 4;

        let next = find(body, delimiter, data_start).ok_or_else(|| {
            ArchiveError::validation("Malformed multipart body: unterminated part")
        })?;
        // The CRLF before the next delimiter belongs to the framing.
        let data_end = if next >= 2 && &body[next - 2..next] == b"\r\n" {
            next - 2
        } else {
            next
        };

        parts.push(BodyPart {
            headers,
            data: body.slice(data_start..data_end),
        });
        at = next;
    }

    Ok(parts)
}

fn parse_headers(raw: &[u8]) -> ArchiveResult<Vec<(String, String)>> {
    let text = std::str::from_utf8(raw).map_err(|_| {
        ArchiveError::validation("Malformed multipart body: non-UTF-8 part headers")
    })?;
    let mut headers = Vec::new();
    for line in text.split("\r\n").filter(|line| !line.is_empty()) {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            ArchiveError::validation(format!("Malformed multipart header line: {line}"))
        })?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_extraction() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=abc123").as_deref(),
            Some("abc123")
        );
        assert_eq!(
            boundary_from_content_type("multipart/form-data; charset=x; boundary=\"q q\"")
                .as_deref(),
            Some("q q")
        );
        assert_eq!(boundary_from_content_type("text/plain"), None);
    }

    #[test]
    fn test_two_part_body() {
        let body = Bytes::from_static(
            b"--B\r\n\
              Content-Type: text/plain\r\n\
              X-compId: data\r\n\
              \r\n\
              first bytes\r\n\
              --B\r\n\
              Content-Type: application/pdf\r\n\
              X-compId: data1\r\n\
              \r\n\
              second\r\n\
              --B--\r\n",
        );
        let parts = parse_multipart(&body, "B").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].header("x-compid"), Some("data"));
        assert_eq!(parts[0].header("Content-Type"), Some("text/plain"));
        assert_eq!(parts[0].data.as_ref(), b"first bytes");
        assert_eq!(parts[1].header("X-compId"), Some("data1"));
        assert_eq!(parts[1].data.as_ref(), b"second");
    }

    #[test]
    fn test_binary_part_data_preserved() {
        let mut body = Vec::new();
        body.extend_from_slice(b"--B\r\nX-compId: data\r\n\r\n");
        body.extend_from_slice(&[0, 1, 2, 13, 10, 255]);
        body.extend_from_slice(b"\r\n--B--\r\n");
        let parts = parse_multipart(&Bytes::from(body), "B").unwrap();
        assert_eq!(parts[0].data.as_ref(), &[0, 1, 2, 13, 10, 255]);
    }

    #[test]
    fn test_missing_boundary_is_validation_error() {
        let err = parse_multipart(&Bytes::from_static(b"no parts here"), "B").unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unterminated_part_is_validation_error() {
        let body = Bytes::from_static(b"--B\r\nX-compId: data\r\n\r\ndangling");
        let err = parse_multipart(&body, "B").unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
    }
}
