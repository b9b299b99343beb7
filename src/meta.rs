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

//! Internal FastCGI protocol metadata structures and parsing.
//!
//! This module contains the internal structures and constants used for
//! serializing and parsing FastCGI wire records: the record header, the
//! enumerated record/role/protocol-status types, the BEGIN_REQUEST and
//! END_REQUEST content bodies, and the variable-length parameter size
//! codec.

use crate::error::{ClientError, ClientResult};
use std::{
    fmt::{self, Display},
    io::{Read, Write},
};

/// FastCGI protocol version 1.
pub(crate) const VERSION_1: u8 = 1;
/// Maximum content length a single record may carry on the wire.
pub const MAX_CONTENT_LENGTH: usize = 65520;
/// Maximum padding length a single record may carry.
pub const MAX_PADDING_LENGTH: usize = 255;
/// Length of the fixed FastCGI record header, in bytes.
pub const HEADER_LEN: usize = 8;
/// Upper bound on a single framed record: header + max content + max pad.
pub const FRAME_BUFFER_LEN: usize = MAX_CONTENT_LENGTH + HEADER_LEN + MAX_PADDING_LENGTH;

/// FastCGI request types as defined in the protocol specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    /// Begin request record type.
    BeginRequest = 1,
    /// Abort request record type.
    AbortRequest = 2,
    /// End request record type.
    EndRequest = 3,
    /// Parameters record type.
    Params = 4,
    /// Stdin record type.
    Stdin = 5,
    /// Stdout record type.
    Stdout = 6,
    /// Stderr record type.
    Stderr = 7,
    /// Data record type.
    Data = 8,
    /// Get values record type.
    GetValues = 9,
    /// Get values result record type.
    GetValuesResult = 10,
    /// Unknown type record type.
    UnknownType = 11,
}

impl RequestType {
    /// Converts a u8 value to a `RequestType`, folding anything
    /// unrecognized into `UnknownType` per the protocol.
    fn from_u8(u: u8) -> Self {
        match u {
            1 => RequestType::BeginRequest,
            2 => RequestType::AbortRequest,
            3 => RequestType::EndRequest,
            4 => RequestType::Params,
            5 => RequestType::Stdin,
            6 => RequestType::Stdout,
            7 => RequestType::Stderr,
            8 => RequestType::Data,
            9 => RequestType::GetValues,
            10 => RequestType::GetValuesResult,
            _ => RequestType::UnknownType,
        }
    }
}

impl Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        Display::fmt(&(*self as u8), f)
    }
}

/// FastCGI application roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Role {
    /// Responder role - handles requests and returns responses.
    Responder = 1,
    /// Authorizer role - performs authorization checks.
    Authorizer = 2,
    /// Filter role - filters data between web server and application.
    Filter = 3,
}

/// FastCGI protocol status codes, carried in the `END_REQUEST` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolStatus {
    /// Request completed successfully.
    RequestComplete = 0,
    /// This app can't multiplex connections.
    CantMpxConn = 1,
    /// New request rejected; too busy.
    Overloaded = 2,
    /// Role value not known.
    UnknownRole = 3,
}

impl ProtocolStatus {
    /// Converts a u8 value to `ProtocolStatus`, folding anything
    /// unrecognized into `UnknownRole`.
    pub(crate) fn from_u8(u: u8) -> Self {
        match u {
            0 => ProtocolStatus::RequestComplete,
            1 => ProtocolStatus::CantMpxConn,
            2 => ProtocolStatus::Overloaded,
            _ => ProtocolStatus::UnknownRole,
        }
    }
}

/// The fixed 8-byte FastCGI record header.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Header {
    /// FastCGI protocol version.
    pub(crate) version: u8,
    /// Type of the FastCGI record.
    pub(crate) r#type: RequestType,
    /// Request ID for this record.
    pub(crate) request_id: u16,
    /// Length of the content data.
    pub(crate) content_length: u16,
    /// Length of padding data.
    pub(crate) padding_length: u8,
    /// Reserved byte, always 0 on write.
    pub(crate) reserved: u8,
}

/// `paddingLength = (-contentLength) mod 8`, keeping every record 8-byte
/// aligned on the wire.
fn padding_for(content_length: u16) -> u8 {
    ((8 - (content_length as usize % 8)) % 8) as u8
}

impl Header {
    /// Builds a header for an outbound record of the given content length.
    fn new(r#type: RequestType, request_id: u16, content_length: usize) -> Self {
        debug_assert!(content_length <= MAX_CONTENT_LENGTH);
        let content_length = content_length as u16;
        Self {
            version: VERSION_1,
            r#type,
            request_id,
            content_length,
            padding_length: padding_for(content_length),
            reserved: 0,
        }
    }

    /// Writes one complete record (header + content + padding) to `writer`
    /// in a single buffered call.
    ///
    /// `write_all` internally loops until the whole buffer has been
    /// accepted by the transport or it reports a real error, so the
    /// "retry until complete" contract from spec.md §4.3 holds without
    /// this function tracking partial writes itself.
    pub(crate) fn write_record<W: Write>(
        writer: &mut W, r#type: RequestType, request_id: u16, content: &[u8],
    ) -> ClientResult<()> {
        let header = Self::new(r#type, request_id, content.len());

        let mut frame =
            Vec::with_capacity(HEADER_LEN + content.len() + header.padding_length as usize);
        frame.push(header.version);
        frame.push(header.r#type as u8);
        frame.extend_from_slice(&header.request_id.to_be_bytes());
        frame.extend_from_slice(&header.content_length.to_be_bytes());
        frame.push(header.padding_length);
        frame.push(header.reserved);
        frame.extend_from_slice(content);
        frame.resize(frame.len() + header.padding_length as usize, 0);

        writer.write_all(&frame)?;
        Ok(())
    }

    /// Reads one record from `reader`, returning its type and content
    /// bytes (padding discarded) on success.
    ///
    /// If the record is `END_REQUEST`, the content and padding are still
    /// fully drained from `reader` before [`ClientError::Eof`] is returned,
    /// so a pool can attempt to reuse the connection. If `version != 1`,
    /// [`ClientError::InvalidVersion`] is returned *without* draining,
    /// since the declared lengths of a peer that botches the version byte
    /// cannot be trusted either.
    pub(crate) fn read_record<R: Read>(reader: &mut R) -> ClientResult<(RequestType, Vec<u8>)> {
        let mut header_buf = [0u8; HEADER_LEN];
        reader.read_exact(&mut header_buf)?;

        let version = header_buf[0];
        let r#type = RequestType::from_u8(header_buf[1]);
        let content_length = u16::from_be_bytes([header_buf[4], header_buf[5]]);
        let padding_length = header_buf[6];

        if version != VERSION_1 {
            return Err(ClientError::InvalidVersion { version });
        }

        let mut content = vec![0u8; content_length as usize + padding_length as usize];
        reader.read_exact(&mut content)?;
        content.truncate(content_length as usize);

        if r#type == RequestType::EndRequest {
            return Err(ClientError::Eof);
        }

        Ok((r#type, content))
    }
}

/// BEGIN_REQUEST record body: role (2 BE) + flags (1) + 5 reserved bytes.
pub(crate) fn begin_request_content(role: Role, keep_alive: bool) -> [u8; 8] {
    let role = (role as u16).to_be_bytes();
    [role[0], role[1], keep_alive as u8, 0, 0, 0, 0, 0]
}

/// Packs a 32-bit value the way the source's `Uint32ToBytes` does: the
/// high-middle byte first, then the top byte, then the low byte last.
/// This is the idiosyncratic byte order preserved bug-for-bug from
/// `original_source/util.go` — see `DESIGN.md`, Open Question 1.
pub(crate) fn pack_quirky_u32(value: u32) -> [u8; 4] {
    [
        (value >> 8) as u8,
        (value >> 16) as u8,
        (value >> 24) as u8,
        value as u8,
    ]
}

/// END_REQUEST record body: `appStatus` (quirky order, see
/// [`pack_quirky_u32`]) + `protocolStatus` (1) + 3 reserved bytes.
pub(crate) fn end_request_content(app_status: u32, protocol_status: ProtocolStatus) -> [u8; 8] {
    let status = pack_quirky_u32(app_status);
    [
        status[0],
        status[1],
        status[2],
        status[3],
        protocol_status as u8,
        0,
        0,
        0,
    ]
}

/// Parameter length encoding for FastCGI NAME/VALUE streams.
#[derive(Debug, Clone, Copy)]
pub enum ParamLength {
    /// Short length (0-127 bytes), encoded as a single byte.
    Short(u8),
    /// Long length (128+ bytes), encoded as 4 big-endian bytes with the
    /// top bit of the first byte set.
    Long(u32),
}

impl ParamLength {
    /// Encodes `length` using the short form if it fits, else the long
    /// form (`length | 0x8000_0000`, written big-endian).
    pub fn new(length: usize) -> Self {
        if length <= 127 {
            ParamLength::Short(length as u8)
        } else {
            ParamLength::Long((length as u32) | (1 << 31))
        }
    }

    /// Serializes this length prefix.
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            ParamLength::Short(l) => vec![l],
            ParamLength::Long(l) => l.to_be_bytes().to_vec(),
        }
    }

    /// Decodes a length prefix from the front of `buf`, returning the
    /// decoded size and the number of bytes consumed (1 or 4).
    ///
    /// Provided for symmetry and testability (spec.md §8 property 3);
    /// unused by any read path, since this crate does not parse NAME/VALUE
    /// streams out of a response (see Non-goals).
    pub fn decode(buf: &[u8]) -> Option<(u32, usize)> {
        let first = *buf.first()?;
        if first & 0x80 == 0 {
            Some((first as u32, 1))
        } else {
            if buf.len() < 4 {
                return None;
            }
            let mut word = [buf[0], buf[1], buf[2], buf[3]];
            word[0] &= 0x7f;
            Some((u32::from_be_bytes(word), 4))
        }
    }
}

/// A single `name=value` parameter pair staged for the PARAMS stream.
#[derive(Debug, Clone)]
pub struct ParamPair {
    name: Vec<u8>,
    value: Vec<u8>,
}

impl ParamPair {
    /// Builds a pair, truncating `value` if `name` and `value` together
    /// would not fit in a single PARAMS record (spec.md §4.5 and Open
    /// Question 3: a pair can never span two records, so truncation, not
    /// splitting, is the only option).
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let mut value = value.into();

        let max_value_len = MAX_CONTENT_LENGTH.saturating_sub(HEADER_LEN + name.len());
        if value.len() > max_value_len {
            value.truncate(max_value_len);
        }

        Self { name, value }
    }

    /// Serializes this pair as `size(name) size(value) name value`.
    pub fn to_content(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.name.len() + self.value.len());
        buf.extend(ParamLength::new(self.name.len()).to_bytes());
        buf.extend(ParamLength::new(self.value.len()).to_bytes());
        buf.extend_from_slice(&self.name);
        buf.extend_from_slice(&self.value);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_keeps_records_eight_byte_aligned() {
        for len in 0..=MAX_CONTENT_LENGTH as u16 {
            let pad = padding_for(len);
            assert_eq!((len as usize + pad as usize) % 8, 0);
            assert!((pad as usize) < 8);
        }
    }

    #[test]
    fn record_round_trip_preserves_content() {
        let mut buf = Vec::new();
        Header::write_record(&mut buf, RequestType::Stdin, 7, b"hello").unwrap();
        assert_eq!(buf.len(), HEADER_LEN + 5 + padding_for(5) as usize);

        let mut cursor = &buf[..];
        let (r#type, content) = Header::read_record(&mut cursor).unwrap();
        assert_eq!(r#type, RequestType::Stdin);
        assert_eq!(content, b"hello");
        assert!(cursor.is_empty());
    }

    #[test]
    fn end_request_record_yields_eof() {
        let mut buf = Vec::new();
        Header::write_record(&mut buf, RequestType::EndRequest, 1, &[0u8; 8]).unwrap();
        let mut cursor = &buf[..];
        let err = Header::read_record(&mut cursor).unwrap_err();
        assert!(err.is_eof());
        assert!(cursor.is_empty());
    }

    #[test]
    fn invalid_version_is_rejected() {
        let mut buf = vec![2u8, RequestType::Stdout as u8, 0, 0, 0, 1, 0, 0];
        buf.extend_from_slice(&[0u8]);
        let mut cursor = &buf[..];
        let err = Header::read_record(&mut cursor).unwrap_err();
        assert!(matches!(err, ClientError::InvalidVersion { version: 2 }));
    }

    #[test]
    fn size_codec_matches_spec_examples() {
        assert_eq!(ParamLength::new(127).to_bytes(), vec![0x7F]);
        assert_eq!(
            ParamLength::new(128).to_bytes(),
            vec![0x80, 0x00, 0x00, 0x80]
        );
        assert_eq!(
            ParamLength::new(0xDEADBEEF_usize & 0x7fff_ffff).to_bytes(),
            vec![0xDE, 0xAD, 0xBE, 0xEF]
        );
    }

    #[test]
    fn size_codec_round_trips() {
        for size in [0usize, 1, 127, 128, 300, 70_000, 1 << 20] {
            let bytes = ParamLength::new(size).to_bytes();
            let (decoded, consumed) = ParamLength::decode(&bytes).unwrap();
            assert_eq!(consumed, bytes.len());
            assert_eq!(decoded as usize, size);
        }
    }

    #[test]
    fn param_pair_truncates_oversized_value() {
        let name = vec![b'k'; 10];
        let value = vec![b'v'; MAX_CONTENT_LENGTH];
        let pair = ParamPair::new(name, value);
        let content = pair.to_content();
        assert!(content.len() <= MAX_CONTENT_LENGTH);
    }

    #[test]
    fn quirky_u32_matches_source_byte_order() {
        // byte0 = high-middle, byte1 = upper, byte2 = top, byte3 = low
        assert_eq!(pack_quirky_u32(0x0102_0304), [0x03, 0x02, 0x01, 0x04]);
    }
}
