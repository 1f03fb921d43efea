//! `multipart/form-data` decoding for package uploads.
//!
//! Publishing tools (twine, `pip upload`) send exactly one artifact per
//! request as a file part among several plain form fields. The decoder
//! buffers the whole body (boundary and header scanning needs the full
//! picture; upload size is bounded upstream by [`crate::config::LimitsConfig`])
//! and walks it with an explicit state machine, returning the first part
//! that declares a `filename`. All working state is local to the call.

use crate::error::{AppError, AppResult};
use axum::http::{header, HeaderMap};
use bytes::Bytes;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// The single file part extracted from a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub filename: String,
    pub bytes: Bytes,
}

/// Scanner position within the boundary-delimited body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Preamble,
    PartHeaders,
    PartBody,
    Done,
}

fn filename_regex() -> &'static Regex {
    static FILENAME: OnceLock<Regex> = OnceLock::new();
    FILENAME.get_or_init(|| {
        Regex::new(r#"filename="([^"]*)""#)
            .unwrap_or_else(|e| panic!("Failed to compile multipart filename regex: {}", e))
    })
}

/// Extract the `boundary` parameter from the request's `Content-Type`.
///
/// The header lookup and the parameter name are both case-insensitive;
/// the value may be quoted. Absence of either fails with
/// [`AppError::MissingBoundary`].
pub fn boundary(headers: &HeaderMap) -> AppResult<String> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::MissingBoundary)?;

    for param in content_type.split(';').skip(1) {
        let param = param.trim();
        if let Some((key, value)) = param.split_once('=') {
            if key.trim().eq_ignore_ascii_case("boundary") {
                let value = value.trim().trim_matches('"');
                if !value.is_empty() {
                    return Ok(value.to_string());
                }
            }
        }
    }
    Err(AppError::MissingBoundary)
}

/// Decode a buffered multipart body and return its single file part.
///
/// Parts are visited in order; the first one whose header block carries a
/// `filename="..."` attribute wins and its body is returned verbatim.
/// Remaining parts are discarded unread. A body without any file part fails
/// with [`AppError::NoFileData`].
pub fn decode(headers: &HeaderMap, body: &Bytes) -> AppResult<FilePart> {
    let boundary = boundary(headers)?;
    let delimiter = format!("--{}", boundary).into_bytes();

    let mut state = ScanState::Preamble;
    let mut pos = 0usize;
    let mut part_headers = String::new();

    while state != ScanState::Done {
        match state {
            ScanState::Preamble => {
                // Skip everything before the first dash-boundary.
                let start = find(body, &delimiter, 0).ok_or(AppError::NoFileData)?;
                pos = start + delimiter.len();
                state = next_after_delimiter(body, &mut pos)?;
            }
            ScanState::PartHeaders => {
                let headers_end =
                    find(body, b"\r\n\r\n", pos).ok_or_else(malformed_body)?;
                part_headers = String::from_utf8_lossy(&body[pos..headers_end]).into_owned();
                pos = headers_end + 4;
                state = ScanState::PartBody;
            }
            ScanState::PartBody => {
                // Part body runs until CRLF followed by the next dash-boundary.
                let mut terminator = Vec::with_capacity(delimiter.len() + 2);
                terminator.extend_from_slice(b"\r\n");
                terminator.extend_from_slice(&delimiter);
                let body_end = find(body, &terminator, pos).ok_or_else(malformed_body)?;

                if let Some(captures) = filename_regex().captures(&part_headers) {
                    let filename = captures[1].to_string();
                    debug!(filename = %filename, size = body_end - pos, "Found file part in multipart body");
                    return Ok(FilePart {
                        filename,
                        bytes: body.slice(pos..body_end),
                    });
                }

                pos = body_end + terminator.len();
                state = next_after_delimiter(body, &mut pos)?;
            }
            ScanState::Done => unreachable!(),
        }
    }

    Err(AppError::NoFileData)
}

/// After a dash-boundary: `--` closes the stream, CRLF opens another part.
fn next_after_delimiter(body: &Bytes, pos: &mut usize) -> AppResult<ScanState> {
    if body[*pos..].starts_with(b"--") {
        return Ok(ScanState::Done);
    }
    if body[*pos..].starts_with(b"\r\n") {
        *pos += 2;
        return Ok(ScanState::PartHeaders);
    }
    Err(malformed_body())
}

fn malformed_body() -> AppError {
    AppError::BadRequest("malformed multipart body".to_string())
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const BOUNDARY: &str = "Q3y0dSKapNnNBVTvJ1Bk";

    fn multipart_headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(content_type).expect("header value"),
        );
        headers
    }

    fn form_body(parts: &[(&str, Option<&str>, &[u8])]) -> Bytes {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, f
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Bytes::from(body)
    }

    #[test]
    fn extracts_boundary_case_insensitively() {
        let headers =
            multipart_headers(&format!("multipart/form-data; BOUNDARY={}", BOUNDARY));
        assert_eq!(boundary(&headers).unwrap(), BOUNDARY);

        let headers =
            multipart_headers(&format!("multipart/form-data; boundary=\"{}\"", BOUNDARY));
        assert_eq!(boundary(&headers).unwrap(), BOUNDARY);
    }

    #[test]
    fn missing_boundary_fails() {
        let headers = multipart_headers("multipart/form-data");
        assert!(matches!(
            boundary(&headers),
            Err(AppError::MissingBoundary)
        ));
        assert!(matches!(boundary(&HeaderMap::new()), Err(AppError::MissingBoundary)));
    }

    #[test]
    fn decodes_single_file_part() {
        let headers =
            multipart_headers(&format!("multipart/form-data; boundary={}", BOUNDARY));
        let body = form_body(&[(
            "content",
            Some("abc-0.1.tar.gz"),
            b"\x1f\x8b binary payload",
        )]);

        let part = decode(&headers, &body).unwrap();
        assert_eq!(part.filename, "abc-0.1.tar.gz");
        assert_eq!(part.bytes.as_ref(), b"\x1f\x8b binary payload");
    }

    #[test]
    fn skips_plain_fields_before_file_part() {
        let headers =
            multipart_headers(&format!("multipart/form-data; boundary={}", BOUNDARY));
        let body = form_body(&[
            (":action", None, b"file_upload"),
            ("protocol_version", None, b"1"),
            ("content", Some("pkg-2.0-py3-none-any.whl"), b"PK\x03\x04data"),
            ("trailing", None, b"ignored"),
        ]);

        let part = decode(&headers, &body).unwrap();
        assert_eq!(part.filename, "pkg-2.0-py3-none-any.whl");
        assert_eq!(part.bytes.as_ref(), b"PK\x03\x04data");
    }

    #[test]
    fn body_with_no_file_part_fails() {
        let headers =
            multipart_headers(&format!("multipart/form-data; boundary={}", BOUNDARY));
        let body = form_body(&[(":action", None, b"file_upload")]);
        assert!(matches!(decode(&headers, &body), Err(AppError::NoFileData)));
    }

    #[test]
    fn file_bytes_survive_embedded_crlf() {
        let headers =
            multipart_headers(&format!("multipart/form-data; boundary={}", BOUNDARY));
        let payload = b"line one\r\nline two\r\n--not-the-boundary\r\nrest";
        let body = form_body(&[("content", Some("x-1.0.tar"), payload)]);

        let part = decode(&headers, &body).unwrap();
        assert_eq!(part.bytes.as_ref(), payload.as_slice());
    }
}
