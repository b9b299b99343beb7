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

//! The live handle returned once a request has been started.
//!
//! spec.md §9 calls out the source's "opaque user slot" (a `requestId`
//! stashed on the pooled connection and fetched back via a runtime type
//! check) as worth re-architecting: instead, `get`/`post`/`post_file`
//! return a `RequestHandle` pairing the connection with its request id, and
//! every subsequent streaming call takes that handle explicitly. The slot
//! disappears entirely.

/// A pooled connection with the request id assigned to its in-flight
/// logical request.
///
/// Returned by [`crate::client::Engine::get`], [`::post`][post] and
/// [`::post_file`][post_file], and threaded through
/// [`crate::client::Engine::read`] and the `write_*` streaming helpers.
///
/// [post]: crate::client::Engine::post
/// [post_file]: crate::client::Engine::post_file
#[derive(Debug)]
pub struct RequestHandle<C> {
    /// The pooled connection carrying this request.
    pub conn: C,
    /// The request id assigned when the request was started.
    pub request_id: u16,
}

impl<C> RequestHandle<C> {
    pub(crate) fn new(conn: C, request_id: u16) -> Self {
        Self { conn, request_id }
    }

    /// Consumes the handle, returning the underlying connection.
    ///
    /// Useful once a caller has drained the response themselves (outside
    /// [`crate::client::Engine::read`]) and wants to release or close it
    /// directly through the pool.
    pub fn into_conn(self) -> C {
        self.conn
    }
}
