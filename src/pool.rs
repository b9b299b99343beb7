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

//! The connection-pool collaborator the engine consumes.
//!
//! The engine never dials a socket itself; it only calls `acquire`,
//! `release`, `reconnect` and `close` on whatever implements
//! [`ConnectionPool`]. This module defines that trait plus one concrete,
//! synchronous, TCP-backed implementation good enough to use directly.

use crate::{error::ClientResult, stream::Stream};
use socket2::{Socket, TcpKeepalive};
use std::{
    collections::VecDeque,
    net::{TcpStream, ToSocketAddrs},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Condvar, Mutex,
    },
    time::Duration,
};
use tracing::debug;

/// The operations an [`crate::client::Engine`] needs from a connection
/// pool. Consumed, never implemented, by the core (spec.md §6).
pub trait ConnectionPool {
    /// The connection type handed out by this pool.
    type Conn: Stream;

    /// Returns a live connection, dialing a new one if the pool has spare
    /// capacity, or blocking until one is released otherwise.
    fn acquire(&self) -> ClientResult<Self::Conn>;

    /// Returns `conn` to the pool for reuse.
    fn release(&self, conn: Self::Conn);

    /// Drops `conn` and dials a fresh replacement, used for the
    /// single broken-pipe retry (spec.md §5).
    fn reconnect(&self, conn: Self::Conn) -> ClientResult<Self::Conn>;

    /// Drops `conn` permanently; it does not return to the pool.
    fn close(&self, conn: Self::Conn) -> ClientResult<()>;

    /// Sets the pool's per-connection I/O buffer size. The engine calls
    /// this once at construction time with `MAX_CONTENT_LENGTH`.
    fn set_buffer_length(&self, n: usize);

    /// Configures the TCP keep-alive interval, in seconds, applied to
    /// connections dialed from this point on.
    fn set_keep_alive(&self, seconds: u64);
}

/// A bounded pool of plain TCP connections to one `(host, port)` upstream.
pub struct TcpConnectionPool {
    host: String,
    port: u16,
    capacity: usize,
    keep_alive_secs: AtomicU64,
    buffer_length: AtomicUsize,
    idle: Mutex<VecDeque<TcpStream>>,
    outstanding: Mutex<usize>,
    available: Condvar,
}

impl TcpConnectionPool {
    /// Creates a pool that dials `host:port` lazily, never holding more
    /// than `capacity` connections (idle + checked out) at once.
    pub fn new(host: impl Into<String>, port: u16, capacity: usize) -> Self {
        Self {
            host: host.into(),
            port,
            capacity: capacity.max(1),
            keep_alive_secs: AtomicU64::new(0),
            buffer_length: AtomicUsize::new(crate::meta::MAX_CONTENT_LENGTH),
            idle: Mutex::new(VecDeque::new()),
            outstanding: Mutex::new(0),
            available: Condvar::new(),
        }
    }

    fn dial(&self) -> ClientResult<TcpStream> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no address resolved")
            })?;
        let stream = TcpStream::connect(addr)?;

        let keep_alive = self.keep_alive_secs.load(Ordering::Relaxed);
        if keep_alive > 0 {
            let socket = Socket::from(stream);
            let params = TcpKeepalive::new().with_time(Duration::from_secs(keep_alive));
            socket.set_tcp_keepalive(&params)?;
            return Ok(socket.into());
        }

        Ok(stream)
    }
}

impl ConnectionPool for TcpConnectionPool {
    type Conn = TcpStream;

    fn acquire(&self) -> ClientResult<TcpStream> {
        loop {
            {
                let mut idle = self.idle.lock().expect("pool mutex poisoned");
                if let Some(conn) = idle.pop_front() {
                    debug!(host = %self.host, port = self.port, "reusing pooled connection");
                    return Ok(conn);
                }
            }

            let mut outstanding = self.outstanding.lock().expect("pool mutex poisoned");
            if *outstanding < self.capacity {
                *outstanding += 1;
                drop(outstanding);
                debug!(host = %self.host, port = self.port, "dialing new connection");
                return self.dial();
            }

            let _unused = self
                .available
                .wait(outstanding)
                .expect("pool condvar poisoned");
        }
    }

    fn release(&self, conn: TcpStream) {
        self.idle.lock().expect("pool mutex poisoned").push_back(conn);
        self.available.notify_one();
    }

    fn reconnect(&self, conn: TcpStream) -> ClientResult<TcpStream> {
        drop(conn);
        self.dial()
    }

    fn close(&self, conn: TcpStream) -> ClientResult<()> {
        drop(conn);
        let mut outstanding = self.outstanding.lock().expect("pool mutex poisoned");
        *outstanding = outstanding.saturating_sub(1);
        self.available.notify_one();
        Ok(())
    }

    fn set_buffer_length(&self, n: usize) {
        self.buffer_length.store(n, Ordering::Relaxed);
    }

    fn set_keep_alive(&self, seconds: u64) {
        self.keep_alive_secs.store(seconds, Ordering::Relaxed);
    }
}
