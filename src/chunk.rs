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

//! Fixed-size chunk walking over a linear buffer.
//!
//! Used to split a large STDIN body into `MAX_CONTENT_LENGTH`-sized
//! records. A direct idiomatic port of `original_source/util.go`'s
//! `GetNextIndex`, returning `Option` in place of the Go sentinel
//! `(-1, -1, -1)`.

/// Describes the next `(start, end, length)` chunk of a buffer of
/// `total_length` bytes, walking forward in steps of `segment_length`.
///
/// Pass `start = None` to get the first chunk. Pass the previous chunk's
/// `start` back in (already advanced by the caller) to get the next one.
/// Returns `None` once the buffer is exhausted.
pub(crate) fn next_chunk(
    start: Option<usize>, segment_length: usize, total_length: usize,
) -> Option<(usize, usize, usize)> {
    match start {
        Some(start) => {
            if start >= total_length {
                return None;
            }
            let end = (start + segment_length).min(total_length);
            Some((start, end, end - start))
        }
        None => {
            if total_length == 0 {
                return None;
            }
            let end = segment_length.min(total_length);
            Some((0, end, end))
        }
    }
}
