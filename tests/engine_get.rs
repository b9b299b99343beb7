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

#[test]
fn empty_get_returns_stdout() {
    let (port, server) = spawn_responder(1, |stream| {
        let (request_id, body, _chunks) = common::read_request(stream);
        assert!(body.is_empty());
        write_response(stream, request_id, b"Hello, world!");
    });

    let engine = Engine::new("127.0.0.1", port, 2);
    let params = Params::new()
        .with_predefined()
        .request_method("GET")
        .script_filename("/var/www/index.php")
        .query_string("");

    let handle = engine.get(params).unwrap();

    let mut response = Response::default();
    let handle = engine
        .read(handle, &mut |content, is_stderr| match content {
            Ok(bytes) => {
                if is_stderr {
                    response.push_stderr(bytes);
                } else {
                    response.push_stdout(bytes);
                }
                ReadControl::Continue
            }
            Err(_) => ReadControl::None,
        })
        .unwrap();

    assert!(handle.is_some());
    engine.release(handle.unwrap());

    assert_eq!(response.stdout.as_deref(), Some(&b"Hello, world!"[..]));
    assert!(response.stderr.is_none());

    server.join().unwrap();
}
