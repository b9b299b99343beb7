// Copyright 2022 jmjoy
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Synthesises a `multipart/form-data` body from a `k1=v1&k2=v2` string,
//! or from a single streamed file part.
//!
//! Grounded in `original_source/form.go` for the exact byte sequence, and
//! in the `multipart` crate's client-side builder
//! (`examples/other_examples/.../tomaka-rouille__multipart-src-client-mod.rs`)
//! for the idiomatic chained-call shape.

use crate::error::ClientResult;
use rand::RngCore;

const CONTENT_DISPOSITION_PREFIX: &[u8] = b"\r\nContent-Disposition: form-data; name=\"";
const FILENAME_PREFIX: &[u8] = b"; filename=\"";
const CONTENT_TYPE_OCTET_STREAM: &[u8] = b"Content-Type: application/octet-stream";
const CRLF: &[u8] = b"\r\n";
const CRLF2: &[u8] = b"\r\n\r\n";
const DASHES: &[u8] = b"--";

/// A freshly generated multipart boundary and its derived `Content-Type`
/// header value.
pub struct Boundary {
    hex: String,
}

impl Boundary {
    /// Generates a new boundary from 30 cryptographically random bytes,
    /// formatted as 60 lowercase hex characters.
    pub fn generate() -> ClientResult<Self> {
        let mut bytes = [0u8; 30];
        rand::rngs::OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Self {
            hex: bytes.iter().map(|b| format!("{b:02x}")).collect(),
        })
    }

    /// The boundary string itself, e.g. `"a1b2c3..."` (60 hex chars).
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// The `Content-Type` header value for a body using this boundary:
    /// `multipart/form-data; boundary=<hex>`.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.hex)
    }
}

/// Parses a `k1=v1&k2=v2` body into `(name, value)` pairs.
///
/// Pairs without exactly one `=` are silently skipped, per spec.md §4.6.
fn parse_form_pairs(body: &[u8]) -> Vec<(&[u8], &[u8])> {
    body.split(|b| *b == b'&')
        .filter_map(|kv| {
            let mut parts = kv.splitn(3, |b| *b == b'=');
            let name = parts.next()?;
            let value = parts.next()?;
            if parts.next().is_some() {
                None // more than one '=' in this pair
            } else {
                Some((name, value))
            }
        })
        .collect()
}

/// Writes the field parts of a `multipart/form-data` body for
/// `k1=v1&k2=v2&...` into a freshly generated boundary, returning the
/// boundary and the assembled body (terminator not yet appended — see
/// [`write_end`]).
pub fn synthesize_fields(body: &[u8]) -> ClientResult<(Boundary, Vec<u8>)> {
    let boundary = Boundary::generate()?;
    let out = encode_fields(boundary.as_str(), body);
    Ok((boundary, out))
}

/// Encodes the field parts of a `k1=v1&k2=v2&...` body against an
/// already-known boundary, for callers streaming a multipart request
/// themselves across several `write_*` calls instead of through
/// [`synthesize_fields`]'s one-shot form.
pub(crate) fn encode_fields(boundary: &str, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 128);
    for (name, value) in parse_form_pairs(body) {
        write_field(&mut out, boundary, name, value);
    }
    out
}

/// Appends one field part:
/// `--<boundary>\r\nContent-Disposition: form-data; name="<name>"\r\n\r\n<value>\r\n`
fn write_field(out: &mut Vec<u8>, boundary: &str, name: &[u8], value: &[u8]) {
    out.extend_from_slice(DASHES);
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(CONTENT_DISPOSITION_PREFIX);
    out.extend_from_slice(name);
    out.push(b'"');
    out.extend_from_slice(CRLF2);
    out.extend_from_slice(value);
    out.extend_from_slice(CRLF);
}

/// Appends one file part:
/// `--<boundary>\r\nContent-Disposition: form-data; name="<name>"; filename="<filename>"\r\nContent-Type: application/octet-stream\r\n\r\n<content>\r\n`
pub fn write_file_part(out: &mut Vec<u8>, boundary: &str, content: &[u8], name: &str, filename: &str) {
    out.extend_from_slice(DASHES);
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(CONTENT_DISPOSITION_PREFIX);
    out.extend_from_slice(name.as_bytes());
    out.push(b'"');
    out.extend_from_slice(FILENAME_PREFIX);
    out.extend_from_slice(filename.as_bytes());
    out.push(b'"');
    out.extend_from_slice(CRLF);
    out.extend_from_slice(CONTENT_TYPE_OCTET_STREAM);
    out.extend_from_slice(CRLF2);
    out.extend_from_slice(content);
    out.extend_from_slice(CRLF);
}

/// Appends the closing boundary: `--<boundary>--\r\n`.
pub fn write_end(out: &mut Vec<u8>, boundary: &str) {
    out.extend_from_slice(DASHES);
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(DASHES);
    out.extend_from_slice(CRLF);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_is_sixty_lowercase_hex_chars() {
        let boundary = Boundary::generate().unwrap();
        assert_eq!(boundary.as_str().len(), 60);
        assert!(boundary
            .as_str()
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn content_type_embeds_boundary() {
        let boundary = Boundary::generate().unwrap();
        assert_eq!(
            boundary.content_type(),
            format!("multipart/form-data; boundary={}", boundary.as_str())
        );
    }

    #[test]
    fn synthesizes_two_fields_from_scenario_s4() {
        let (boundary, body) = synthesize_fields(b"a=1&b=2").unwrap();
        let b = boundary.as_str();
        let expected = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--{b}\r\nContent-Disposition: form-data; name=\"b\"\r\n\r\n2\r\n"
        );
        assert_eq!(String::from_utf8(body).unwrap(), expected);
    }

    #[test]
    fn skips_pairs_without_exactly_one_equals() {
        let (_, body) = synthesize_fields(b"a=1&bogus&c=d=e").unwrap();
        let body = String::from_utf8(body).unwrap();
        assert!(body.contains("name=\"a\""));
        assert!(!body.contains("name=\"bogus\""));
        assert!(!body.contains("name=\"c\""));
    }

    #[test]
    fn file_part_and_terminator_shape() {
        let boundary = Boundary::generate().unwrap();
        let mut out = Vec::new();
        write_file_part(&mut out, boundary.as_str(), b"binary", "upload", "a.bin");
        write_end(&mut out, boundary.as_str());

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(&format!("--{}", boundary.as_str())));
        assert!(text.contains("name=\"upload\"; filename=\"a.bin\""));
        assert!(text.contains("Content-Type: application/octet-stream"));
        assert!(text.ends_with(&format!("--{}--\r\n", boundary.as_str())));
    }
}
