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

//! Draining a FastCGI response: the streaming primitive and a buffered
//! convenience built on top of it.
//!
//! spec.md §4.7 describes `Read` as a loop that decodes one record at a
//! time and hands its content to a caller-supplied callback, which returns
//! an opcode telling the loop whether to keep going, stop, or close the
//! connection. [`ReadControl`] is that opcode and [`OnRead`] is the
//! callback shape. [`Response`] is the accumulator the source's own
//! `execute`-style helpers build on top of the same loop, kept here as
//! ambient sugar for callers who just want STDOUT/STDERR as buffers.

use std::{fmt, fmt::Debug, str};

/// What a [`OnRead`] callback tells the read loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadControl {
    /// Stop the loop without closing the connection, e.g. once the caller
    /// has seen enough.
    None,
    /// Decode and deliver another record.
    Continue,
    /// Stop the loop and close the connection through the pool. If the
    /// close itself fails, the error is reported to the engine's
    /// `on_error` hook (if one was installed) rather than returned, since
    /// the caller who asked for `Break` has already moved past reading.
    Break,
}

/// A callback invoked once per STDOUT/STDERR record decoded from the
/// response stream.
///
/// `content` is `Ok(bytes)` for a successfully decoded record or
/// `Err(err)` if reading failed (including the normal end-of-stream
/// [`crate::error::ClientError::Eof`]); `is_stderr` distinguishes STDERR
/// records from STDOUT ones. The returned [`ReadControl`] drives the loop.
pub type OnRead<'a> =
    dyn FnMut(Result<&[u8], &crate::error::ClientError>, bool) -> ReadControl + 'a;

/// Buffered STDOUT/STDERR accumulated from a response, for callers who
/// don't need to stream records themselves.
#[derive(Default, Clone)]
#[non_exhaustive]
pub struct Response {
    pub stdout: Option<Vec<u8>>,
    pub stderr: Option<Vec<u8>>,
}

impl Response {
    /// Appends a chunk of STDOUT content, for callers accumulating a
    /// [`Response`] from inside an [`OnRead`] callback.
    pub fn push_stdout(&mut self, chunk: &[u8]) {
        self.stdout.get_or_insert_with(Vec::new).extend_from_slice(chunk);
    }

    /// Appends a chunk of STDERR content.
    pub fn push_stderr(&mut self, chunk: &[u8]) {
        self.stderr.get_or_insert_with(Vec::new).extend_from_slice(chunk);
    }
}

impl Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("Response")
            .field("stdout", &self.stdout.as_deref().map(str::from_utf8))
            .field("stderr", &self.stderr.as_deref().map(str::from_utf8))
            .finish()
    }
}
