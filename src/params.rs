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

//! FastCGI request parameters.
//!
//! `Params` is an ordered bag of `name=value` pairs sent as the PARAMS
//! stream. It offers chained setters for the well-known CGI variables (in
//! the style of the crate's own historical synchronous API) as well as a
//! generic escape hatch and a constructor from a flat alternating
//! `name, value, name, value, ...` sequence, the shape spec.md §6 requires
//! the public API to accept.

use crate::error::{ClientError, ClientResult};

/// An ordered collection of FastCGI parameter pairs.
#[derive(Debug, Default, Clone)]
pub struct Params {
    pairs: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a parameter set from a flat `[name, value, name, value, ...]`
    /// sequence.
    ///
    /// Returns an error if `flat` has odd length, per spec.md §9 Open
    /// Question 4 ("implementations should validate").
    pub fn from_flat<I, T>(flat: I) -> ClientResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Vec<u8>>,
    {
        let items: Vec<Vec<u8>> = flat.into_iter().map(Into::into).collect();
        if items.len() % 2 != 0 {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "params list must have an even length (name, value pairs)",
            )));
        }

        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut it = items.into_iter();
        while let (Some(name), Some(value)) = (it.next(), it.next()) {
            pairs.push((name, value));
        }
        Ok(Self { pairs })
    }

    /// Adds an arbitrary parameter pair.
    pub fn param(mut self, name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.pairs.push((name.into(), value.into()));
        self
    }

    /// Appends more pairs in place, used internally by `post_file` to add
    /// the synthesised `CONTENT_TYPE`/`CONTENT_LENGTH` after the caller's
    /// own params.
    pub(crate) fn extend(&mut self, more: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>) {
        self.pairs.extend(more);
    }

    /// The pairs in insertion order.
    pub(crate) fn pairs(&self) -> &[(Vec<u8>, Vec<u8>)] {
        &self.pairs
    }

    /// Sets `REQUEST_METHOD`.
    pub fn request_method(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("REQUEST_METHOD", v)
    }

    /// Sets `SCRIPT_FILENAME`, the absolute path the responder should run.
    pub fn script_filename(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("SCRIPT_FILENAME", v)
    }

    /// Sets `SCRIPT_NAME`.
    pub fn script_name(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("SCRIPT_NAME", v)
    }

    /// Sets `QUERY_STRING`.
    pub fn query_string(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("QUERY_STRING", v)
    }

    /// Sets `REQUEST_URI`.
    pub fn request_uri(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("REQUEST_URI", v)
    }

    /// Sets `DOCUMENT_URI`.
    pub fn document_uri(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("DOCUMENT_URI", v)
    }

    /// Sets `DOCUMENT_ROOT`.
    pub fn document_root(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("DOCUMENT_ROOT", v)
    }

    /// Sets `REMOTE_ADDR`.
    pub fn remote_addr(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("REMOTE_ADDR", v)
    }

    /// Sets `REMOTE_PORT`.
    pub fn remote_port(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("REMOTE_PORT", v)
    }

    /// Sets `SERVER_ADDR`.
    pub fn server_addr(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("SERVER_ADDR", v)
    }

    /// Sets `SERVER_PORT`.
    pub fn server_port(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("SERVER_PORT", v)
    }

    /// Sets `SERVER_NAME`.
    pub fn server_name(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("SERVER_NAME", v)
    }

    /// Sets `SERVER_PROTOCOL`.
    pub fn server_protocol(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("SERVER_PROTOCOL", v)
    }

    /// Sets `CONTENT_TYPE`.
    pub fn content_type(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("CONTENT_TYPE", v)
    }

    /// Sets `CONTENT_LENGTH`.
    pub fn content_length(self, v: impl Into<Vec<u8>>) -> Self {
        self.param("CONTENT_LENGTH", v)
    }

    /// Applies the three parameters every request carries regardless of
    /// what the caller set explicitly: `GATEWAY_INTERFACE`,
    /// `SERVER_SOFTWARE`, and `SERVER_PROTOCOL` defaulted to `HTTP/1.1`.
    pub fn with_predefined(self) -> Self {
        self.param("GATEWAY_INTERFACE", "FastCGI/1.0")
            .param("SERVER_SOFTWARE", "fastcgi-engine/rust")
            .server_protocol("HTTP/1.1")
    }
}
