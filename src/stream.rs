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

//! The blocking transport abstraction a [`crate::pool::ConnectionPool`]
//! hands out. Anything that is a cloneable, thread-safe byte stream
//! qualifies — a TCP socket, a Unix socket, or (useful in tests) a file.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::TcpStream;

/// A duplex byte stream that can be cloned (so reader and writer halves,
/// or pool bookkeeping, can share the same underlying descriptor) and
/// moved across threads.
pub trait Stream: Sync + Send + Sized + Read + Write {
    /// Clones the underlying descriptor. Mirrors `TcpStream::try_clone`.
    fn try_clone(&self) -> Result<Self, io::Error>;
}

impl Stream for TcpStream {
    fn try_clone(&self) -> Result<Self, io::Error> {
        self.try_clone()
    }
}

#[cfg(unix)]
impl Stream for std::os::unix::net::UnixStream {
    fn try_clone(&self) -> Result<Self, io::Error> {
        self.try_clone()
    }
}

impl Stream for File {
    fn try_clone(&self) -> Result<Self, io::Error> {
        self.try_clone()
    }
}
