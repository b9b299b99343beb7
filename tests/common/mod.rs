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

//! A minimal in-process FastCGI responder, used so the integration tests
//! don't depend on a live PHP-FPM. Deliberately reimplements just enough
//! of the wire format from raw bytes rather than reusing the crate's own
//! (private) codec, so a codec bug in the crate can't also hide in the
//! test harness.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const TYPE_BEGIN_REQUEST: u8 = 1;
pub const TYPE_END_REQUEST: u8 = 3;
pub const TYPE_PARAMS: u8 = 4;
pub const TYPE_STDIN: u8 = 5;
pub const TYPE_STDOUT: u8 = 6;

fn read_record(stream: &mut TcpStream) -> Option<(u8, u16, Vec<u8>)> {
    let mut header = [0u8; 8];
    stream.read_exact(&mut header).ok()?;
    let r#type = header[1];
    let request_id = u16::from_be_bytes([header[2], header[3]]);
    let content_length = u16::from_be_bytes([header[4], header[5]]) as usize;
    let padding_length = header[6] as usize;
    let mut body = vec![0u8; content_length + padding_length];
    stream.read_exact(&mut body).ok()?;
    body.truncate(content_length);
    Some((r#type, request_id, body))
}

fn write_record(stream: &mut TcpStream, r#type: u8, request_id: u16, content: &[u8]) {
    let padding = (8 - (content.len() % 8)) % 8;
    let mut frame = Vec::with_capacity(8 + content.len() + padding);
    frame.push(1u8); // version
    frame.push(r#type);
    frame.extend_from_slice(&request_id.to_be_bytes());
    frame.extend_from_slice(&(content.len() as u16).to_be_bytes());
    frame.push(padding as u8);
    frame.push(0); // reserved
    frame.extend_from_slice(content);
    frame.resize(frame.len() + padding, 0);
    stream.write_all(&frame).unwrap();
}

/// Reads one full logical request (BEGIN_REQUEST, PARAMS*, STDIN*) off
/// `stream`, returning the request id and the concatenated STDIN body
/// along with the sizes of each individual STDIN chunk received (so
/// tests can assert on chunking behavior).
///
/// An empty STDIN stream is sent as no records at all (not even an empty
/// sentinel), so after the PARAMS terminator this briefly switches the
/// stream to a short read timeout: a request with a body has already
/// finished writing its STDIN records by the time the client side turns
/// around to read the response, so a timeout here unambiguously means
/// "no STDIN stream was sent".
pub fn read_request(stream: &mut TcpStream) -> (u16, Vec<u8>, Vec<usize>) {
    let (r#type, request_id, _) = read_record(stream).expect("expected BEGIN_REQUEST");
    assert_eq!(r#type, TYPE_BEGIN_REQUEST);

    loop {
        let (r#type, _, content) = read_record(stream).expect("expected PARAMS record");
        assert_eq!(r#type, TYPE_PARAMS);
        if content.is_empty() {
            break;
        }
    }

    let mut body = Vec::new();
    let mut chunk_sizes = Vec::new();
    stream.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    loop {
        let (r#type, _, content) = match read_record(stream) {
            Some(record) => record,
            None => break,
        };
        assert_eq!(r#type, TYPE_STDIN);
        if content.is_empty() {
            break;
        }
        chunk_sizes.push(content.len());
        body.extend_from_slice(&content);
    }
    stream.set_read_timeout(None).unwrap();

    (request_id, body, chunk_sizes)
}

pub fn write_response(stream: &mut TcpStream, request_id: u16, stdout: &[u8]) {
    write_record(stream, TYPE_STDOUT, request_id, stdout);
    // app_status = 0, protocol_status = 0 (REQUEST_COMPLETE), quirky byte
    // order doesn't matter here since nothing decodes it back.
    write_record(stream, TYPE_END_REQUEST, request_id, &[0u8; 8]);
}

/// Spawns a listener that serves `handler` once per accepted connection,
/// for `connections` connections, then stops. Returns the bound port and
/// the server thread's handle.
pub fn spawn_responder<F>(connections: usize, handler: F) -> (u16, JoinHandle<()>)
where
    F: Fn(&mut TcpStream) + Send + 'static + Clone,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let join = thread::spawn(move || {
        for stream in listener.incoming().take(connections) {
            let mut stream = stream.unwrap();
            handler(&mut stream);
        }
    });
    (port, join)
}
