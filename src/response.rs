//! Response writer (C3).
//!
//! A response moves through a small set of states (`NotStarted` →
//! `Streaming` → `Done`) and a panic on out-of-order calls stands in for
//! an assertion that the handler built the response correctly, since that
//! is a programmer error rather than a runtime condition. Status line and
//! headers are coalesced into one buffered write; body chunks below
//! [`DIRECT_SEND_THRESHOLD`] are coalesced with them, larger ones are sent
//! straight from their source.

use crate::error::WriteError;
use crate::io::fs::FileStream;
use crate::io::socket::{SendOutcome, Socket};
use crate::reader::FixedBuf;
use crate::step::Step;
use crate::version::Version;
use std::io;

/// Body chunks at or above this size bypass the coalescing buffer and are
/// sent directly, to avoid a needless extra copy for large payloads.
pub const DIRECT_SEND_THRESHOLD: usize = 1024;

/// The coalescing send buffer: bytes are queued, growing the buffer to fit
/// if necessary, then flushed with one non-blocking `send` per `poll_flush`
/// call, `consume`-ing only what the kernel actually accepted. Both
/// [`ResponseWriter`] and [`ws::WsConnection`](crate::ws::WsConnection)
/// write through this same primitive, so a response head and a WebSocket
/// frame are flushed with identical partial-write and would-block handling.
pub struct SendBuffer {
    buf: FixedBuf,
}

impl SendBuffer {
    pub fn with_capacity(cap: usize) -> SendBuffer {
        SendBuffer { buf: FixedBuf::with_capacity(cap) }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Coalesces `bytes` into the buffer only if they fit in the remaining
    /// capacity; returns `false` (buffer untouched) otherwise, so a caller
    /// that needs to stay within a fixed memory budget can fall back to
    /// sending directly instead.
    #[must_use]
    pub fn try_queue(&mut self, bytes: &[u8]) -> bool {
        self.buf.extend_from_slice(bytes)
    }

    /// Queues `bytes`, growing the buffer if they don't fit. For a single
    /// write that must be sent as one unit and cannot be split into a
    /// direct-send fallback — a response head, a WebSocket frame — rather
    /// than a stream of independently-sendable chunks.
    pub fn queue(&mut self, bytes: &[u8]) {
        if bytes.len() > self.buf.remaining_capacity() {
            let mut grown = FixedBuf::with_capacity(self.buf.len() + bytes.len());
            assert!(grown.extend_from_slice(self.buf.as_slice()), "freshly sized buffer fits its own prior contents");
            self.buf = grown;
        }
        assert!(self.buf.extend_from_slice(bytes), "buffer grown to fit the queued bytes");
    }

    /// Flushes whatever is currently staged. `Step::Done(())` once the
    /// buffer is fully drained.
    pub fn poll_flush<S: Socket>(&mut self, sock: &mut S) -> Step<(), io::Error> {
        if self.buf.is_empty() {
            return Step::Done(());
        }
        match sock.send(self.buf.as_slice()) {
            Ok(SendOutcome::Ready(n)) => {
                self.buf.consume(n);
                if self.buf.is_empty() {
                    Step::Done(())
                } else {
                    Step::Progress
                }
            }
            Ok(SendOutcome::WouldBlock) => Step::Suspend,
            Err(e) => Step::Failed(e),
        }
    }
}

/// A resumable source of response body bytes.
pub trait ChunkProducer {
    /// Produces the next chunk. `Step::Done(None)` signals end of body.
    fn poll_chunk(&mut self) -> Step<Option<Vec<u8>>, String>;
}

/// Where a response body comes from.
pub enum BodySource {
    /// A body already fully in memory.
    Bytes(Vec<u8>),
    /// A file stream plus its known length (C7 reads this from file size
    /// at open time so `Content-Length` can be set up front).
    File(Box<dyn FileStream>, u64),
    /// A handler-driven generator of chunks, used when a handler streams
    /// its own output instead of returning a complete `Response`.
    Chunks(Box<dyn ChunkProducer>),
    /// No body at all (101, 204, HEAD responses).
    Empty,
}

impl BodySource {
    /// The body length, if knowable without consuming the source.
    pub fn known_length(&self) -> Option<u64> {
        match self {
            BodySource::Bytes(b) => Some(b.len() as u64),
            BodySource::File(_, len) => Some(*len),
            BodySource::Chunks(_) => None,
            BodySource::Empty => Some(0),
        }
    }
}

/// A response to be written back to the client.
pub struct Response {
    pub status_code: u16,
    pub reason_phrase: String,
    /// Headers in the order they should be emitted (§6: "emitted in
    /// registration order").
    pub headers: Vec<(String, String)>,
    pub body: BodySource,
    /// Force `Connection: close` regardless of what the request asked for.
    pub close: bool,
}

impl Response {
    pub fn new(status_code: u16, reason_phrase: &str) -> Response {
        Response {
            status_code,
            reason_phrase: reason_phrase.to_string(),
            headers: Vec::new(),
            body: BodySource::Empty,
            close: false,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Response {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, content_type: &str, body: Vec<u8>) -> Response {
        self.headers.push(("Content-Type".to_string(), content_type.to_string()));
        self.body = BodySource::Bytes(body);
        self
    }

    pub fn text(status_code: u16, reason_phrase: &str, body: &str) -> Response {
        Response::new(status_code, reason_phrase).with_body("text/plain", body.as_bytes().to_vec())
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

/// Synthesizes a bare error response for a status code the core itself
/// raises (400, 404, 408, 413, 500) — see §6 and §7.
pub fn synthesize(status_code: u16, reason_phrase: &str) -> Response {
    let body = format!("{} {}\n", status_code, reason_phrase);
    Response::text(status_code, reason_phrase, &body)
}

enum WriteState {
    NotStarted(Response),
    Streaming { body: BodySource, close: bool },
    Done,
}

/// The resumable response serializer.
pub struct ResponseWriter {
    send_buf: SendBuffer,
    state: WriteState,
    version: Version,
}

impl ResponseWriter {
    /// `request_wants_keep_alive` and `version` come from the request this
    /// response answers; `is_head` suppresses the body per HTTP semantics.
    pub fn new(send_buffer_size: usize, version: Version, mut response: Response, request_wants_keep_alive: bool, is_head: bool) -> ResponseWriter {
        if is_head {
            response.body = BodySource::Empty;
        }
        let close = response.close
            || !request_wants_keep_alive
            || (response.body.known_length().is_none() && !response.has_header("Content-Length"));

        if !response.has_header("Content-Length") {
            if let Some(len) = response.body.known_length() {
                response.headers.push(("Content-Length".to_string(), len.to_string()));
            }
        }
        if close && !response.has_header("Connection") {
            response.headers.push(("Connection".to_string(), "close".to_string()));
        }

        ResponseWriter {
            send_buf: SendBuffer::with_capacity(send_buffer_size),
            state: WriteState::NotStarted(response),
            version,
        }
    }

    fn serialize_head(&mut self, response: &Response) {
        let mut head = Vec::with_capacity(128);
        head.extend_from_slice(format!("{} {} {}\r\n", self.version, response.status_code, response.reason_phrase).as_bytes());
        for (name, value) in &response.headers {
            head.extend_from_slice(name.as_bytes());
            head.extend_from_slice(b": ");
            head.extend_from_slice(value.as_bytes());
            head.extend_from_slice(b"\r\n");
        }
        head.extend_from_slice(b"\r\n");
        self.send_buf.queue(&head);
    }

    /// Flushes whatever is currently staged in the coalescing buffer.
    fn flush<S: Socket>(&mut self, sock: &mut S) -> Step<(), WriteError> {
        match self.send_buf.poll_flush(sock) {
            Step::Done(()) => Step::Done(()),
            Step::Progress => Step::Progress,
            Step::Suspend => Step::Suspend,
            Step::Failed(e) => Step::Failed(WriteError::Io(e)),
        }
    }

    /// Advances the writer by one bounded step. `Step::Done(keep_alive)`
    /// reports whether the connection may be reused for another request.
    pub fn poll<S: Socket>(&mut self, sock: &mut S, now: f64, deadline: f64) -> Step<bool, WriteError> {
        if now >= deadline {
            return Step::Failed(WriteError::Timeout);
        }
        loop {
            match std::mem::replace(&mut self.state, WriteState::Done) {
                WriteState::NotStarted(response) => {
                    self.serialize_head(&response);
                    let close = response.close
                        || response.headers.iter().any(|(n, v)| n.eq_ignore_ascii_case("Connection") && v.eq_ignore_ascii_case("close"));
                    self.state = WriteState::Streaming { body: response.body, close };
                    return Step::Progress;
                }
                WriteState::Streaming { body, close } => {
                    if !self.send_buf.is_empty() {
                        self.state = WriteState::Streaming { body, close };
                        return match self.flush(sock) {
                            Step::Done(()) => Step::Progress,
                            Step::Progress => Step::Progress,
                            Step::Suspend => Step::Suspend,
                            Step::Failed(e) => Step::Failed(e),
                        };
                    }
                    let mut body = body;
                    match next_body_action(&mut body) {
                        NextAction::Done => {
                            self.state = WriteState::Done;
                            return Step::Done(!close);
                        }
                        NextAction::Suspend => {
                            self.state = WriteState::Streaming { body, close };
                            return Step::Suspend;
                        }
                        NextAction::Failed(msg) => {
                            self.state = WriteState::Done;
                            return Step::Failed(WriteError::Io(std::io::Error::new(std::io::ErrorKind::Other, msg)));
                        }
                        NextAction::Chunk(chunk) => {
                            if chunk.len() >= DIRECT_SEND_THRESHOLD {
                                self.state = WriteState::Streaming { body, close };
                                return send_direct(sock, &chunk);
                            }
                            if !self.send_buf.try_queue(&chunk) {
                                // Coalescing buffer is full: flush it first,
                                // then retry with the same chunk next tick
                                // by sending it directly instead.
                                self.state = WriteState::Streaming { body, close };
                                return send_direct(sock, &chunk);
                            }
                            self.state = WriteState::Streaming { body, close };
                        }
                    }
                }
                WriteState::Done => return Step::Done(false),
            }
        }
    }
}

enum NextAction {
    Chunk(Vec<u8>),
    Done,
    Suspend,
    Failed(String),
}

fn next_body_action(body: &mut BodySource) -> NextAction {
    const FILE_CHUNK: usize = 8192;
    match body {
        BodySource::Empty => NextAction::Done,
        BodySource::Bytes(bytes) => {
            if bytes.is_empty() {
                NextAction::Done
            } else {
                NextAction::Chunk(std::mem::take(bytes))
            }
        }
        BodySource::File(stream, remaining) => {
            if *remaining == 0 {
                return NextAction::Done;
            }
            let want = FILE_CHUNK.min(*remaining as usize);
            let mut buf = vec![0u8; want];
            match stream.read(&mut buf) {
                Ok(0) => NextAction::Failed("file ended before Content-Length was satisfied".to_string()),
                Ok(n) => {
                    buf.truncate(n);
                    *remaining -= n as u64;
                    NextAction::Chunk(buf)
                }
                Err(e) => NextAction::Failed(e.to_string()),
            }
        }
        BodySource::Chunks(producer) => match producer.poll_chunk() {
            Step::Done(Some(chunk)) => NextAction::Chunk(chunk),
            Step::Done(None) => NextAction::Done,
            Step::Progress | Step::Suspend => NextAction::Suspend,
            Step::Failed(e) => NextAction::Failed(e),
        },
    }
}

fn send_direct<S: Socket>(sock: &mut S, chunk: &[u8]) -> Step<bool, WriteError> {
    match sock.send(chunk) {
        Ok(SendOutcome::Ready(n)) if n == chunk.len() => Step::Progress,
        Ok(SendOutcome::Ready(_)) => Step::Progress,
        Ok(SendOutcome::WouldBlock) => Step::Suspend,
        Err(e) => Step::Failed(WriteError::Io(e)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reader::test_socket::MockSocket;

    fn drive(writer: &mut ResponseWriter, sock: &mut MockSocket) -> bool {
        for _ in 0..64 {
            match writer.poll(sock, 0.0, 10.0) {
                Step::Done(keep_alive) => return keep_alive,
                Step::Progress | Step::Suspend => continue,
                Step::Failed(e) => panic!("write failed: {:?}", e),
            }
        }
        panic!("writer did not finish in time");
    }

    #[test]
    fn hello_world_matches_the_literal_scenario() {
        let response = Response::text(200, "OK", "hi");
        let mut writer = ResponseWriter::new(256, Version::Http11, response, true, false);
        let mut sock = MockSocket::with_input(b"");
        drive(&mut writer, &mut sock);
        let out = String::from_utf8(sock.outbound).unwrap();
        assert_eq!(out, "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nhi");
    }

    #[test]
    fn unknown_length_without_explicit_header_forces_close() {
        struct Forever(u32);
        impl ChunkProducer for Forever {
            fn poll_chunk(&mut self) -> Step<Option<Vec<u8>>, String> {
                if self.0 == 0 {
                    Step::Done(None)
                } else {
                    self.0 -= 1;
                    Step::Done(Some(b"x".to_vec()))
                }
            }
        }
        let mut response = Response::new(200, "OK");
        response.body = BodySource::Chunks(Box::new(Forever(3)));
        let mut writer = ResponseWriter::new(256, Version::Http11, response, true, false);
        let mut sock = MockSocket::with_input(b"");
        let keep_alive = drive(&mut writer, &mut sock);
        assert!(!keep_alive);
        let out = String::from_utf8(sock.outbound).unwrap();
        assert!(out.contains("Connection: close"));
    }

    #[test]
    fn head_request_suppresses_body() {
        let response = Response::text(200, "OK", "hi");
        let mut writer = ResponseWriter::new(256, Version::Http11, response, true, true);
        let mut sock = MockSocket::with_input(b"");
        drive(&mut writer, &mut sock);
        let out = String::from_utf8(sock.outbound).unwrap();
        assert!(out.ends_with("Content-Length: 2\r\n\r\n"));
    }

    #[test]
    fn request_without_keep_alive_closes() {
        let response = Response::text(200, "OK", "bye");
        let mut writer = ResponseWriter::new(256, Version::Http11, response, false, false);
        let mut sock = MockSocket::with_input(b"");
        let keep_alive = drive(&mut writer, &mut sock);
        assert!(!keep_alive);
    }
}
