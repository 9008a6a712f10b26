//! Connection coroutine (C5): one client's lifecycle from accepted socket
//! to closed, expressed as the explicit state enum §9 calls for in place
//! of generator syntax. [`Connection::poll`] is the `step()` the scheduler
//! (C6) calls once per tick per active connection.

use crate::config::ServerConfig;
use crate::error::{ConnError, HandlerError, HttpError, ReadError};
use crate::headers::Headers;
use crate::io::clock::Clock;
use crate::io::socket::Socket;
use crate::method::Method;
use crate::reader::{poll_read_exact, poll_read_until, FixedBuf};
use crate::request::{self, Request, RequestLine};
use crate::response::{synthesize, Response, ResponseWriter};
use crate::route::{HandlerOutcome, Router};
use crate::step::Step;
use crate::version::Version;
use crate::ws::handshake::accept_key_for;
use crate::ws::{WsApp, WsConnection};
use std::net::SocketAddr;

const CRLF: &[u8] = b"\r\n";

/// What to do once a buffered [`ResponseWriter`] finishes, decided at the
/// moment the write begins rather than inferred from the response later.
enum AfterWrite {
    /// Ordinary request/response: honor the writer's own keep-alive
    /// verdict and either loop back to `ReadingRequestLine` or close.
    Normal,
    /// A synthesized error response (400/408/413/500) or a parse failure:
    /// §7 says these either answer then close, or close outright — never
    /// keep-alive, since the connection's read state is not trustworthy
    /// enough to reuse.
    AlwaysClose,
    /// The 101 handshake response: once flushed, hand the socket to the
    /// WebSocket engine instead of reading another request.
    Upgrade(Box<dyn WsApp>),
}

enum State {
    ReadingRequestLine { line_buf: FixedBuf },
    ReadingHeaders { line_buf: FixedBuf, request_line: RequestLine, headers: Headers },
    ReadingBody { request_line: RequestLine, headers: Headers, body_buf: FixedBuf },
    Dispatching { request: Request },
    Deferred { request: Request, producer: Box<dyn crate::step::Poll<Output = Response, Error = HandlerError>> },
    WritingResponse { writer: ResponseWriter, after: AfterWrite },
    WsOpen { ws: WsConnection },
    Closed,
}

/// One accepted client connection, driving itself through C1–C4 (and C8
/// after an upgrade) a bounded step at a time.
pub struct Connection<S: Socket> {
    socket: S,
    peer_addr: SocketAddr,
    state: State,
    deadline: f64,
    recv_scratch: Vec<u8>,
}

impl<S: Socket> Connection<S> {
    pub fn new(socket: S, peer_addr: SocketAddr, config: &ServerConfig, now: f64) -> Connection<S> {
        Connection {
            socket,
            peer_addr,
            state: State::ReadingRequestLine { line_buf: FixedBuf::with_capacity(config.max_request_line_size) },
            deadline: now + config.request_timeout_seconds as f64,
            recv_scratch: vec![0u8; config.recv_buffer_size],
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Unwraps the connection back into its socket, e.g. for a test that
    /// needs to inspect what was written.
    pub fn into_socket(self) -> S {
        self.socket
    }

    /// Forces an immediate transition to `CLOSED`, abandoning whatever
    /// phase the connection was in. Used by [`Server::stop`](crate::server::Server::stop)
    /// and by deadline expiry outside a pre-response state.
    pub fn request_close(&mut self) {
        let _ = self.socket.close();
        self.state = State::Closed;
    }

    /// Advances the connection by exactly one bounded step.
    pub fn poll(&mut self, router: &Router, config: &ServerConfig, clock: &dyn Clock) -> Step<(), ConnError> {
        let now = clock.now_secs();
        match std::mem::replace(&mut self.state, State::Closed) {
            State::ReadingRequestLine { mut line_buf } => {
                match poll_read_until(&mut self.socket, &mut line_buf, &mut self.recv_scratch, CRLF, now, self.deadline) {
                    Step::Done(pos) => {
                        let line = match std::str::from_utf8(&line_buf.as_slice()[..pos]) {
                            Ok(s) => s.to_string(),
                            Err(_) => return self.fail_read(ReadError::BadRequest("request line is not valid utf-8")),
                        };
                        line_buf.consume(pos + CRLF.len());
                        match request::parse_request_line(&line) {
                            Ok(request_line) => {
                                self.state = State::ReadingHeaders { line_buf, request_line, headers: Headers::new() };
                                Step::Progress
                            }
                            Err(e) => self.fail_read(e),
                        }
                    }
                    Step::Progress => {
                        self.state = State::ReadingRequestLine { line_buf };
                        Step::Progress
                    }
                    Step::Suspend => {
                        self.state = State::ReadingRequestLine { line_buf };
                        Step::Suspend
                    }
                    Step::Failed(e) => self.fail_read(e),
                }
            }

            State::ReadingHeaders { mut line_buf, request_line, mut headers } => {
                match poll_read_until(&mut self.socket, &mut line_buf, &mut self.recv_scratch, CRLF, now, self.deadline) {
                    Step::Done(pos) => {
                        let line = match std::str::from_utf8(&line_buf.as_slice()[..pos]) {
                            Ok(s) => s.to_string(),
                            Err(_) => return self.fail_read(ReadError::BadRequest("header line is not valid utf-8")),
                        };
                        line_buf.consume(pos + CRLF.len());
                        if line.is_empty() {
                            match request::content_length(&headers, config.max_body_bytes) {
                                Ok(n) => {
                                    self.state = State::ReadingBody { request_line, headers, body_buf: FixedBuf::with_capacity(n) };
                                    Step::Progress
                                }
                                Err(e) => self.fail_read(e),
                            }
                        } else {
                            match request::parse_header_line(&line) {
                                Ok((name, value)) => {
                                    headers.insert_first_seen(name, value);
                                    self.state = State::ReadingHeaders { line_buf, request_line, headers };
                                    Step::Progress
                                }
                                Err(e) => self.fail_read(e),
                            }
                        }
                    }
                    Step::Progress => {
                        self.state = State::ReadingHeaders { line_buf, request_line, headers };
                        Step::Progress
                    }
                    Step::Suspend => {
                        self.state = State::ReadingHeaders { line_buf, request_line, headers };
                        Step::Suspend
                    }
                    Step::Failed(e) => self.fail_read(e),
                }
            }

            State::ReadingBody { request_line, headers, mut body_buf } => {
                let want = body_buf.capacity();
                if want == 0 {
                    let request = build_request(request_line, headers, Vec::new());
                    self.state = State::Dispatching { request };
                    return Step::Progress;
                }
                match poll_read_exact(&mut self.socket, &mut body_buf, &mut self.recv_scratch, want, now, self.deadline) {
                    Step::Done(()) => {
                        let body = body_buf.as_slice().to_vec();
                        let request = build_request(request_line, headers, body);
                        self.state = State::Dispatching { request };
                        Step::Progress
                    }
                    Step::Progress => {
                        self.state = State::ReadingBody { request_line, headers, body_buf };
                        Step::Progress
                    }
                    Step::Suspend => {
                        self.state = State::ReadingBody { request_line, headers, body_buf };
                        Step::Suspend
                    }
                    Step::Failed(e) => self.fail_read(e),
                }
            }

            State::Dispatching { request } => self.dispatch(request, router, config),

            State::Deferred { request, mut producer } => match producer.poll() {
                Step::Done(response) => {
                    self.begin_write(response, &request, config);
                    Step::Progress
                }
                Step::Progress => {
                    self.state = State::Deferred { request, producer };
                    Step::Progress
                }
                Step::Suspend => {
                    self.state = State::Deferred { request, producer };
                    Step::Suspend
                }
                Step::Failed(err) => {
                    log::error!("{}: handler failed: {}", self.peer_addr, err);
                    let (status, reason) = err.http_status();
                    self.begin_write(synthesize(status, reason), &request, config);
                    Step::Progress
                }
            },

            State::WritingResponse { mut writer, after } => match writer.poll(&mut self.socket, now, self.deadline) {
                Step::Done(keep_alive) => {
                    match after {
                        AfterWrite::Upgrade(app) => {
                            self.state = State::WsOpen { ws: WsConnection::new(config.max_body_bytes, app) };
                        }
                        AfterWrite::Normal if keep_alive => {
                            self.deadline = now + config.request_timeout_seconds as f64;
                            self.state = State::ReadingRequestLine { line_buf: FixedBuf::with_capacity(config.max_request_line_size) };
                        }
                        AfterWrite::Normal | AfterWrite::AlwaysClose => {
                            let _ = self.socket.close();
                            self.state = State::Closed;
                        }
                    }
                    Step::Progress
                }
                Step::Progress => {
                    self.state = State::WritingResponse { writer, after };
                    Step::Progress
                }
                Step::Suspend => {
                    self.state = State::WritingResponse { writer, after };
                    Step::Suspend
                }
                Step::Failed(e) => {
                    let _ = self.socket.close();
                    self.state = State::Closed;
                    Step::Failed(ConnError::Write(e))
                }
            },

            State::WsOpen { mut ws } => match ws.poll(&mut self.socket, &mut self.recv_scratch) {
                Step::Done(()) => {
                    let _ = self.socket.close();
                    self.state = State::Closed;
                    Step::Done(())
                }
                Step::Progress => {
                    self.state = State::WsOpen { ws };
                    Step::Progress
                }
                Step::Suspend => {
                    self.state = State::WsOpen { ws };
                    Step::Suspend
                }
                Step::Failed(e) => {
                    let _ = self.socket.close();
                    self.state = State::Closed;
                    Step::Failed(ConnError::Ws(e))
                }
            },

            State::Closed => Step::Done(()),
        }
    }

    fn dispatch(&mut self, request: Request, router: &Router, config: &ServerConfig) -> Step<(), ConnError> {
        if request.effective_method() == Some(Method::Websocket) {
            return match router.dispatch_ws(&request) {
                Some(app) => {
                    let accept = accept_key_for(&request.headers)
                        .expect("is_websocket_upgrade already confirmed Sec-WebSocket-Key is present");
                    let handshake = Response::new(101, "Switching Protocols")
                        .with_header("Upgrade", "websocket")
                        .with_header("Connection", "Upgrade")
                        .with_header("Sec-WebSocket-Accept", &accept);
                    let writer = ResponseWriter::new(config.send_buffer_size, request.version, handshake, true, false);
                    self.state = State::WritingResponse { writer, after: AfterWrite::Upgrade(app) };
                    Step::Progress
                }
                None => {
                    self.begin_write(synthesize(404, "Not Found"), &request, config);
                    Step::Progress
                }
            };
        }

        match router.dispatch_http(&request) {
            HandlerOutcome::Response(response) => {
                self.begin_write(response, &request, config);
                Step::Progress
            }
            HandlerOutcome::Deferred(producer) => {
                self.state = State::Deferred { request, producer };
                Step::Progress
            }
        }
    }

    fn begin_write(&mut self, response: Response, request: &Request, config: &ServerConfig) {
        let is_head = request.method == "HEAD";
        let writer = ResponseWriter::new(config.send_buffer_size, request.version, response, request.wants_keep_alive(), is_head);
        self.state = State::WritingResponse { writer, after: AfterWrite::Normal };
    }

    /// A C1/C2 failure in a pre-response state: translate into a
    /// synthesized response per §7, then always close afterward (a
    /// connection that failed to parse cannot be trusted to resync to
    /// the next request). Reports `Progress`, not `Failed` — the
    /// `WritingResponse` state still has to run before this connection is
    /// actually done; `Failed` here would tell the scheduler to stop
    /// polling before the error response is ever sent.
    fn fail_read(&mut self, err: ReadError) -> Step<(), ConnError> {
        if matches!(err, ReadError::ConnectionClosed) {
            log::trace!("{}: connection closed before a complete request arrived", self.peer_addr);
            let _ = self.socket.close();
            self.state = State::Closed;
            return Step::Done(());
        }
        let (status, reason) = err.http_status();
        log::debug!("{}: {} -> {} {}", self.peer_addr, err, status, reason);
        let response = synthesize(status, reason);
        let writer = ResponseWriter::new(self.recv_scratch.len(), Version::Http11, response, false, false);
        self.state = State::WritingResponse { writer, after: AfterWrite::AlwaysClose };
        Step::Progress
    }
}

fn build_request(request_line: RequestLine, headers: Headers, body: Vec<u8>) -> Request {
    Request { method: request_line.method, path: request_line.path, query: request_line.query, headers, body, version: request_line.version }
}
