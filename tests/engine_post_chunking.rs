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

mod common;

use common::{spawn_responder, write_response};
use fastcgi_engine::{Engine, Params, ReadControl, Response};

/// A 70,000-byte STDIN body must be split into a 65,520-byte chunk
/// followed by a 4,480-byte chunk (spec.md scenario S2), each its own
/// STDIN record.
#[test]
fn large_body_splits_into_max_content_chunks() {
    let body = vec![b'x'; 70_000];

    let (port, server) = spawn_responder(1, |stream| {
        let (request_id, received, chunk_sizes) = common::read_request(stream);
        assert_eq!(chunk_sizes, vec![65_520, 4_480]);
        assert_eq!(received.len(), 70_000);
        write_response(stream, request_id, b"ok");
    });

    let engine = Engine::new("127.0.0.1", port, 2);
    let params = Params::new()
        .with_predefined()
        .request_method("POST")
        .script_filename("/var/www/index.php")
        .content_length(body.len().to_string());

    let handle = engine.post(params, &body).unwrap();

    let mut response = Response::default();
    let handle = engine
        .read(handle, &mut |content, is_stderr| match content {
            Ok(bytes) => {
                if !is_stderr {
                    response.push_stdout(bytes);
                }
                ReadControl::Continue
            }
            Err(_) => ReadControl::None,
        })
        .unwrap();
    engine.release(handle.unwrap());

    assert_eq!(response.stdout.as_deref(), Some(&b"ok"[..]));
    server.join().unwrap();
}
