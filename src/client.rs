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

//! The FastCGI client engine: request construction, the streaming reader,
//! and the write helpers for callers who stream a request body themselves.
//!
//! `Engine` is generic over [`ConnectionPool`] so callers can supply their
//! own transport while keeping [`TcpConnectionPool`] as the batteries-
//! included default. It owns the request id allocator and nothing else
//! shared between requests: the staging buffers the source kept as
//! engine-level fields are built fresh on the stack inside each call, per
//! the redesign in `DESIGN.md`.

use crate::{
    chunk::next_chunk,
    error::{ClientError, ClientResult},
    id::RequestIdAllocator,
    meta::{
        begin_request_content, end_request_content, pack_quirky_u32, Header, ParamPair,
        ProtocolStatus, RequestType, Role, MAX_CONTENT_LENGTH,
    },
    multipart::{self, synthesize_fields, Boundary},
    params::Params,
    pool::{ConnectionPool, TcpConnectionPool},
    request::RequestHandle,
    response::{OnRead, ReadControl},
};
use std::sync::Mutex;
use tracing::debug;

/// FastCGI flags byte, `KEEP_ALIVE` bit set: the source always asks the
/// responder to leave the connection open after `END_REQUEST`, since
/// connection lifetime here is governed by the pool, not this flag.
const KEEP_ALIVE_FLAG: bool = true;

fn is_broken_pipe(err: &ClientError) -> bool {
    matches!(err, ClientError::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
}

/// The FastCGI client engine.
///
/// Construct with [`Engine::new`] for the default TCP-backed pool, or
/// [`Engine::with_pool`] to supply a custom [`ConnectionPool`].
pub struct Engine<P: ConnectionPool> {
    pool: P,
    ids: RequestIdAllocator,
    on_error: Mutex<Option<Box<dyn Fn(&ClientError) + Send + Sync>>>,
}

impl Engine<TcpConnectionPool> {
    /// Creates an engine that dials `host:port` over TCP, pooling up to
    /// `pool_capacity` connections.
    pub fn new(host: impl Into<String>, port: u16, pool_capacity: usize) -> Self {
        let pool = TcpConnectionPool::new(host, port, pool_capacity);
        pool.set_buffer_length(MAX_CONTENT_LENGTH);
        Self::with_pool(pool)
    }
}

impl<P: ConnectionPool> Engine<P> {
    /// Wraps an already-constructed connection pool.
    pub fn with_pool(pool: P) -> Self {
        Self {
            pool,
            ids: RequestIdAllocator::new(),
            on_error: Mutex::new(None),
        }
    }

    /// Configures the TCP keep-alive interval used by connections the
    /// pool dials from this point on.
    pub fn set_keep_alive(&self, seconds: u64) {
        self.pool.set_keep_alive(seconds);
    }

    /// Installs a hook invoked when [`Engine::read`] closes a connection
    /// after a `BREAK` opcode and that close itself fails. Not invoked for
    /// any other error path; see spec.md §7.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&ClientError) + Send + Sync + 'static,
    {
        *self.on_error.lock().expect("on_error mutex poisoned") = Some(Box::new(handler));
    }

    /// Returns `handle`'s connection to the pool for reuse.
    pub fn release(&self, handle: RequestHandle<P::Conn>) {
        self.pool.release(handle.conn);
    }

    /// Drops `handle`'s connection permanently.
    pub fn close(&self, handle: RequestHandle<P::Conn>) -> ClientResult<()> {
        self.pool.close(handle.conn)
    }

    /// Closes and redials `handle`'s connection in place, keeping the same
    /// request id.
    pub fn reconnect(&self, handle: RequestHandle<P::Conn>) -> ClientResult<RequestHandle<P::Conn>> {
        let conn = self.pool.reconnect(handle.conn)?;
        Ok(RequestHandle::new(conn, handle.request_id))
    }

    /// Starts a `RESPONDER` request with no STDIN body.
    pub fn get(&self, params: Params) -> ClientResult<RequestHandle<P::Conn>> {
        self.start_request(params, b"")
    }

    /// Starts a `RESPONDER` request, sending `body` as the STDIN stream.
    pub fn post(&self, params: Params, body: &[u8]) -> ClientResult<RequestHandle<P::Conn>> {
        self.start_request(params, body)
    }

    /// Starts a `RESPONDER` request after synthesising a
    /// `multipart/form-data` body from the URL-encoded `form_body`, per
    /// spec.md §4.6. `CONTENT_TYPE` and `CONTENT_LENGTH` are appended to
    /// `params` automatically; the synthesised multipart payload (not
    /// `form_body` itself) is sent as the STDIN stream. The fields are not
    /// terminated here — the terminator is only emitted by the separate
    /// streaming `write_multipart_form_file_end` call.
    pub fn post_file(
        &self, mut params: Params, form_body: &[u8],
    ) -> ClientResult<RequestHandle<P::Conn>> {
        let (boundary, body) = synthesize_fields(form_body)?;

        let content_length = pack_quirky_u32(body.len() as u32);
        params.extend([
            (b"CONTENT_TYPE".to_vec(), boundary.content_type().into_bytes()),
            (b"CONTENT_LENGTH".to_vec(), content_length.to_vec()),
        ]);

        self.start_request(params, &body)
    }

    fn start_request(&self, params: Params, body: &[u8]) -> ClientResult<RequestHandle<P::Conn>> {
        let request_id = self.ids.next();
        let mut conn = self.pool.acquire()?;
        debug!(request_id, "constructing request");

        match self.write_request(&mut conn, request_id, &params, body) {
            Ok(()) => Ok(RequestHandle::new(conn, request_id)),
            Err(err) if is_broken_pipe(&err) => {
                debug!(request_id, "broken pipe during request construction, retrying once");
                let mut conn = self.pool.reconnect(conn)?;
                self.write_request(&mut conn, request_id, &params, body)?;
                Ok(RequestHandle::new(conn, request_id))
            }
            Err(err) => {
                let _ = self.pool.close(conn);
                Err(err)
            }
        }
    }

    /// Emits `BEGIN_REQUEST`, the `PARAMS` stream (terminated by an empty
    /// record), then the `STDIN` stream (terminated by an empty record).
    fn write_request(
        &self, conn: &mut P::Conn, request_id: u16, params: &Params, body: &[u8],
    ) -> ClientResult<()> {
        Header::write_record(
            conn,
            RequestType::BeginRequest,
            request_id,
            &begin_request_content(Role::Responder, KEEP_ALIVE_FLAG),
        )?;
        self.write_params(conn, request_id, params)?;
        self.write_stdin_body(conn, request_id, body)?;
        Ok(())
    }

    fn write_params(&self, conn: &mut P::Conn, request_id: u16, params: &Params) -> ClientResult<()> {
        for (name, value) in params.pairs() {
            let pair = ParamPair::new(name.clone(), value.clone());
            Header::write_record(conn, RequestType::Params, request_id, &pair.to_content())?;
        }
        Header::write_record(conn, RequestType::Params, request_id, b"")
    }

    /// Emits nothing at all when `body` is empty: an empty STDIN sentinel
    /// record is only written to terminate a non-empty STDIN stream.
    fn write_stdin_body(&self, conn: &mut P::Conn, request_id: u16, body: &[u8]) -> ClientResult<()> {
        if body.is_empty() {
            return Ok(());
        }
        self.write_stdin_chunks(conn, request_id, body)?;
        Header::write_record(conn, RequestType::Stdin, request_id, b"")
    }

    /// Walks `content` in `MAX_CONTENT_LENGTH`-sized pieces, writing each
    /// as its own `STDIN` record. Does not emit the empty sentinel record,
    /// so it doubles as the primitive behind the streaming `write_*`
    /// helpers below, which leave the sentinel to the caller's final call.
    fn write_stdin_chunks(&self, conn: &mut P::Conn, request_id: u16, content: &[u8]) -> ClientResult<()> {
        let mut cursor = None;
        while let Some((start, end, _)) = next_chunk(cursor, MAX_CONTENT_LENGTH, content.len()) {
            Header::write_record(conn, RequestType::Stdin, request_id, &content[start..end])?;
            cursor = Some(end);
        }
        Ok(())
    }

    /// Streams raw form-encoded content as one or more `STDIN` records,
    /// for a request started without a body and built up across several
    /// calls (spec.md §6).
    pub fn write_form_data(&self, handle: &mut RequestHandle<P::Conn>, content: &[u8]) -> ClientResult<()> {
        self.write_stdin_chunks(&mut handle.conn, handle.request_id, content)
    }

    /// Streams one or more `k=v` multipart fields against an
    /// already-generated `boundary`.
    pub fn write_multipart_form_data(
        &self, handle: &mut RequestHandle<P::Conn>, boundary: &Boundary, content: &[u8],
    ) -> ClientResult<()> {
        let encoded = multipart::encode_fields(boundary.as_str(), content);
        self.write_stdin_chunks(&mut handle.conn, handle.request_id, &encoded)
    }

    /// Streams one multipart file part against an already-generated
    /// `boundary`.
    pub fn write_multipart_form_file_content(
        &self, handle: &mut RequestHandle<P::Conn>, boundary: &Boundary, content: &[u8], name: &str,
        filename: &str,
    ) -> ClientResult<()> {
        let mut part = Vec::new();
        multipart::write_file_part(&mut part, boundary.as_str(), content, name, filename);
        self.write_stdin_chunks(&mut handle.conn, handle.request_id, &part)
    }

    /// Streams the closing `--<boundary>--\r\n` terminator. Does not emit
    /// the empty `STDIN` sentinel; callers finishing a streamed request
    /// still need that written, e.g. via [`Engine::write_form_data`] with
    /// an empty slice.
    pub fn write_multipart_form_file_end(
        &self, handle: &mut RequestHandle<P::Conn>, boundary: &Boundary,
    ) -> ClientResult<()> {
        let mut terminator = Vec::new();
        multipart::write_end(&mut terminator, boundary.as_str());
        self.write_stdin_chunks(&mut handle.conn, handle.request_id, &terminator)
    }

    /// Writes an `END_REQUEST` record with the given status pair.
    pub fn write_end_request(
        &self, handle: &mut RequestHandle<P::Conn>, app_status: u32, protocol_status: ProtocolStatus,
    ) -> ClientResult<()> {
        Header::write_record(
            &mut handle.conn,
            RequestType::EndRequest,
            handle.request_id,
            &end_request_content(app_status, protocol_status),
        )
    }

    /// Drains `handle`'s connection record by record, invoking `on_read`
    /// for each, per spec.md §4.7.
    ///
    /// Returns `Ok(Some(handle))` if the loop stopped without closing the
    /// connection (`NONE`, or `CONTINUE` after an empty/erroring decode),
    /// leaving the caller responsible for eventually releasing or closing
    /// it. Returns `Ok(None)` once `BREAK` has closed it through the pool;
    /// a failure during that close is reported to the `on_error` hook
    /// rather than returned, matching the source.
    pub fn read(
        &self, handle: RequestHandle<P::Conn>, on_read: &mut OnRead<'_>,
    ) -> ClientResult<Option<RequestHandle<P::Conn>>> {
        let RequestHandle {
            mut conn,
            request_id,
        } = handle;

        loop {
            match Header::read_record(&mut conn) {
                Ok((r#type, content)) => {
                    let is_stderr = r#type == RequestType::Stderr;
                    let is_empty = content.is_empty();
                    match on_read(Ok(&content), is_stderr) {
                        ReadControl::None => return Ok(Some(RequestHandle::new(conn, request_id))),
                        ReadControl::Break => {
                            self.close_reporting(conn);
                            return Ok(None);
                        }
                        ReadControl::Continue if is_empty => {
                            return Ok(Some(RequestHandle::new(conn, request_id)))
                        }
                        ReadControl::Continue => continue,
                    }
                }
                Err(err) => {
                    return match on_read(Err(&err), false) {
                        ReadControl::Break => {
                            self.close_reporting(conn);
                            Ok(None)
                        }
                        ReadControl::None | ReadControl::Continue => {
                            Ok(Some(RequestHandle::new(conn, request_id)))
                        }
                    };
                }
            }
        }
    }

    fn close_reporting(&self, conn: P::Conn) {
        if let Err(err) = self.pool.close(conn) {
            if let Some(hook) = self.on_error.lock().expect("on_error mutex poisoned").as_ref() {
                hook(&err);
            }
        }
    }
}
