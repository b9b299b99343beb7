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

//! Error types and result type aliases for FastCGI operations.
//!
//! This module defines the error types that can occur during FastCGI
//! communication and provides convenient type aliases for results.

/// Result type alias for FastCGI client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Error types that can occur during FastCGI communication.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Any I/O failure on the pooled connection, including a broken pipe.
    ///
    /// A broken pipe encountered while *constructing* a request is retried
    /// once internally (see [`crate::client::Engine`]); this variant only
    /// surfaces once that retry has also failed, or for failures outside
    /// the retried window (e.g. reading the response).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The peer sent a record whose `version` byte was not `1`.
    ///
    /// The record's content and padding are still drained off the wire so
    /// a caller that insists on reusing the connection can do so, but
    /// reuse is not recommended: the stream position relative to record
    /// boundaries is no longer trustworthy once a peer sends something
    /// this malformed.
    #[error("invalid FastCGI protocol version: {version}")]
    InvalidVersion {
        /// The unexpected version byte read from the wire.
        version: u8,
    },

    /// The peer sent `END_REQUEST`, ending the logical response stream.
    ///
    /// This is not an exceptional condition: it is how a FastCGI responder
    /// signals normal completion. It is represented as an error so the
    /// streaming reader's callback always receives control through one
    /// path (`on_read(content, n, err)`), matching the source behavior.
    #[error("end of FastCGI response stream (END_REQUEST received)")]
    Eof,

    /// A caller-facing API was invoked without a [`crate::request::RequestHandle`]
    /// carrying a request id — e.g. a streaming write was attempted before
    /// `get`/`post`/`post_file` produced a handle.
    #[error("no request id associated with this connection")]
    GetRequestId,

    /// The system entropy source failed while generating a multipart
    /// boundary.
    #[error("failed to generate multipart boundary: {0}")]
    Random(#[from] rand::Error),
}

impl ClientError {
    /// True for the narrow case the streaming reader treats as a normal,
    /// expected end of the response rather than a transport failure.
    pub fn is_eof(&self) -> bool {
        matches!(self, ClientError::Eof)
    }
}
