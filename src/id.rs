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

//! FastCGI request-ID allocation.
//!
//! A monotonic 16-bit counter, mutex-guarded so concurrent `next()` calls
//! from different threads never observe the same value. Wraps to 0 before
//! it would ever hand out `u16::MAX` (65535), which the protocol reserves.

use std::sync::Mutex;

const MAX_ID: u16 = u16::MAX;

/// Allocates request IDs for requests started against one `Engine`.
pub(crate) struct RequestIdAllocator {
    next: Mutex<u16>,
}

impl RequestIdAllocator {
    /// Creates an allocator whose first `next()` call returns `1`.
    pub(crate) fn new() -> Self {
        Self {
            next: Mutex::new(1),
        }
    }

    /// Returns the current value, then advances the counter, wrapping to
    /// 0 instead of ever producing `u16::MAX`.
    pub(crate) fn next(&self) -> u16 {
        let mut guard = self.next.lock().expect("request id mutex poisoned");
        let id = *guard;
        *guard = if id + 1 >= MAX_ID { 0 } else { id + 1 };
        id
    }
}
