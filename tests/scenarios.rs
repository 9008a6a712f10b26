//! End-to-end scenarios driving the cooperative scheduler the way a host
//! loop would: build a router, hand it a socket double, and call `poll`/
//! `turn` until the expected outcome appears or a bounded number of steps
//! is exhausted.

use cohttp::io::clock::Clock;
use cohttp::io::fs::{FileStream, Filesystem};
use cohttp::io::socket::{Listener, Socket};
use cohttp::reader::test_socket::MockSocket;
use cohttp::route::HandlerOutcome;
use cohttp::{Method, Response, Router, Server, ServerConfig};
use std::cell::Cell;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// A clock the test drives explicitly instead of `SystemClock`'s real one,
/// so timeout scenarios don't need to actually sleep.
struct FakeClock(Cell<f64>);

impl FakeClock {
    fn new() -> FakeClock {
        FakeClock(Cell::new(0.0))
    }
    fn advance(&self, secs: f64) {
        self.0.set(self.0.get() + secs);
    }
}

impl Clock for FakeClock {
    fn now_secs(&self) -> f64 {
        self.0.get()
    }
}

fn drive<S: Socket>(conn: &mut cohttp::connection::Connection<S>, router: &Router, config: &ServerConfig, clock: &dyn Clock, max_steps: usize) {
    for _ in 0..max_steps {
        if conn.is_closed() {
            return;
        }
        conn.poll(router, config, clock);
    }
}

#[test]
fn scenario_1_hello_world_get() {
    let mut router = Router::new();
    router
        .add_route(Method::Get, "/hello", Box::new(|_req, _c| HandlerOutcome::Response(Response::text(200, "OK", "hi"))))
        .unwrap();

    let config = ServerConfig::default();
    let clock = FakeClock::new();
    let request = b"GET /hello?name=world HTTP/1.1\r\nHost: x\r\n\r\n";
    let mut conn = cohttp::connection::Connection::new(MockSocket::with_input(request), addr(), &config, clock.now_secs());

    drive(&mut conn, &router, &config, &clock, 64);

    let out = conn.into_socket().outbound;
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Content-Length: 2\r\n"));
    assert!(text.ends_with("\r\n\r\nhi"));
}

#[test]
fn scenario_2_oversized_body_is_413_and_closes() {
    let router = Router::new();
    let config = ServerConfig::default();
    let clock = FakeClock::new();
    let request = b"POST /anything HTTP/1.1\r\nContent-Length: 1000000\r\n\r\n";
    let mut conn = cohttp::connection::Connection::new(MockSocket::with_input(request), addr(), &config, clock.now_secs());

    drive(&mut conn, &router, &config, &clock, 64);

    assert!(conn.is_closed());
    let out = String::from_utf8(conn.into_socket().outbound).unwrap();
    assert!(out.starts_with("HTTP/1.1 413"));
    assert!(out.contains("Connection: close"));
}

#[test]
fn scenario_3_stalled_client_times_out() {
    let router = Router::new();
    let config = ServerConfig::builder().request_timeout_seconds(5).build();
    let clock = FakeClock::new();
    // First 10 bytes only, then the client stalls.
    let mut conn = cohttp::connection::Connection::new(MockSocket::with_input(b"GET /partia"), addr(), &config, clock.now_secs());

    // A few steps while the partial line sits unterminated.
    for _ in 0..4 {
        conn.poll(&router, &config, &clock);
    }
    assert!(!conn.is_closed());

    clock.advance(6.0);
    drive(&mut conn, &router, &config, &clock, 64);

    assert!(conn.is_closed());
    let out = String::from_utf8(conn.into_socket().outbound).unwrap();
    assert!(out.starts_with("HTTP/1.1 408"));
}

#[test]
fn scenario_4_websocket_echo_round_trip() {
    let mut router = Router::new();
    router
        .add_ws_route("/ws", Box::new(|_req, _c| Box::new(cohttp::ws::EchoApp) as Box<dyn cohttp::ws::WsApp>))
        .unwrap();

    let config = ServerConfig::default();
    let clock = FakeClock::new();
    let handshake = "GET /ws HTTP/1.1\r\n\
         Host: x\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n";
    let mask = [1u8, 2, 3, 4];
    let payload = b"ping";
    let mut frame = vec![0x81, 0x80 | payload.len() as u8];
    frame.extend_from_slice(&mask);
    frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));

    let mut input = handshake.as_bytes().to_vec();
    input.extend_from_slice(&frame);
    let mut conn = cohttp::connection::Connection::new(MockSocket::with_input(&input), addr(), &config, clock.now_secs());

    drive(&mut conn, &router, &config, &clock, 128);

    let out = conn.into_socket().outbound;
    let text = String::from_utf8_lossy(&out);
    assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(text.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));

    let head_end = out.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    let ws_bytes = &out[head_end..];
    assert_eq!(ws_bytes[0], 0x80 | 0x1); // FIN + text opcode, never masked
    assert_eq!(&ws_bytes[2..], b"Echo: ping");
}

struct InMemoryFs {
    files: HashMap<PathBuf, Vec<u8>>,
}

struct InMemoryStream(std::io::Cursor<Vec<u8>>);

impl FileStream for InMemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        std::io::Read::read(&mut self.0, buf)
    }
}

impl Filesystem for InMemoryFs {
    type Stream = InMemoryStream;

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
    fn size(&self, path: &Path) -> io::Result<u64> {
        self.files.get(path).map(|b| b.len() as u64).ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
    fn open_read(&self, path: &Path) -> io::Result<InMemoryStream> {
        self.files
            .get(path)
            .map(|b| InMemoryStream(std::io::Cursor::new(b.clone())))
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

#[test]
fn scenario_5_prefers_gzip_sibling() {
    let fs = InMemoryFs {
        files: HashMap::from([
            (PathBuf::from("jquery.js"), b"plain bytes".to_vec()),
            (PathBuf::from("jquery.js.gz"), b"gz bytes".to_vec()),
        ]),
    };

    let mut router = Router::new();
    router
        .add_route(
            Method::Get,
            "/jquery.js",
            Box::new(move |req, _c| HandlerOutcome::Response(cohttp::static_file::serve(&fs, Path::new("jquery.js"), &req.headers, "application/javascript"))),
        )
        .unwrap();

    let config = ServerConfig::default();
    let clock = FakeClock::new();
    let request = b"GET /jquery.js HTTP/1.1\r\nAccept-Encoding: gzip\r\n\r\n";
    let mut conn = cohttp::connection::Connection::new(MockSocket::with_input(request), addr(), &config, clock.now_secs());

    drive(&mut conn, &router, &config, &clock, 64);

    let out = String::from_utf8(conn.into_socket().outbound).unwrap();
    assert!(out.contains("Content-Encoding: gzip\r\n"));
    assert!(out.ends_with("gz bytes"));
}

#[test]
fn scenario_6_slow_connection_does_not_starve_a_fast_one() {
    let mut router = Router::new();
    router.add_route(Method::Get, "/fast", Box::new(|_req, _c| HandlerOutcome::Response(Response::text(200, "OK", "done")))).unwrap();

    let config = ServerConfig::default();
    let clock = FakeClock::new();

    let mut slow = cohttp::connection::Connection::new(MockSocket::with_input(b"GET /fas"), addr(), &config, clock.now_secs());
    let mut fast =
        cohttp::connection::Connection::new(MockSocket::with_input(b"GET /fast HTTP/1.1\r\nConnection: close\r\n\r\n"), addr(), &config, clock.now_secs());

    // One round-robin step per connection, repeated: the fast connection
    // must finish in a small, fixed number of rounds regardless of the
    // slow one never completing its request line.
    let mut fast_done_at = None;
    for round in 0..16 {
        slow.poll(&router, &config, &clock);
        fast.poll(&router, &config, &clock);
        if fast.is_closed() && fast_done_at.is_none() {
            fast_done_at = Some(round);
        }
    }

    assert!(fast_done_at.is_some(), "fast connection never completed");
    assert!(fast_done_at.unwrap() < 8, "fast connection took unexpectedly long");
    assert!(!slow.is_closed(), "slow connection should still be waiting, not failed");
}

struct OneShotListener {
    conn: Option<(MockSocket, SocketAddr)>,
}

impl Listener for OneShotListener {
    type Conn = MockSocket;

    fn accept(&mut self) -> io::Result<Option<(MockSocket, SocketAddr)>> {
        Ok(self.conn.take())
    }
    fn set_nonblocking(&mut self, _nonblocking: bool) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn server_turn_accepts_and_serves_one_connection() {
    let mut router = Router::new();
    router.add_route(Method::Get, "/", Box::new(|_req, _c| HandlerOutcome::Response(Response::text(200, "OK", "hi")))).unwrap();

    let listener = OneShotListener { conn: Some((MockSocket::with_input(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n"), addr())) };
    let mut server = Server::new(listener, router, ServerConfig::default());

    let first = server.turn();
    assert!(first.accepted);
    assert_eq!(first.active_connections, 1);

    let mut last = first;
    for _ in 0..32 {
        if last.active_connections == 0 {
            break;
        }
        last = server.turn();
    }
    assert_eq!(last.active_connections, 0);
    assert_eq!(last.reaped, 1);
}

fn addr() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}
