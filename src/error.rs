//! Error taxonomy.
//!
//! Every fallible step-producer in this crate fails into one of the kinds
//! below. `HttpError` lets [`connection::Connection`](crate::connection::Connection)
//! turn any of them into a response without matching every variant at the
//! call site.

use std::io;

/// Trait for an error that can be rendered as an HTTP status line.
pub trait HttpError {
    /// Status code and canonical reason phrase for this error.
    fn http_status(&self) -> (u16, &'static str);
}

quick_error! {
    /// Errors from the bounded reader (C1) and request parser (C2).
    #[derive(Debug)]
    pub enum ReadError {
        /// The peer closed the connection in an orderly way before a
        /// complete request arrived. Not a failure: swallowed silently by
        /// the connection coroutine.
        ConnectionClosed {
            display("connection closed by peer")
        }
        /// The deadline for this request elapsed.
        Timeout {
            display("request timed out")
        }
        /// Buffering more bytes would exceed the configured cap.
        RequestTooLarge {
            display("request exceeds configured size limit")
        }
        /// Malformed request line, headers, or `Content-Length`.
        BadRequest(reason: &'static str) {
            display("bad request: {}", reason)
        }
        /// Socket-level I/O failure other than would-block.
        Io(err: io::Error) {
            from()
            display("I/O error: {}", err)
        }
    }
}

impl HttpError for ReadError {
    fn http_status(&self) -> (u16, &'static str) {
        use ReadError::*;
        match *self {
            ConnectionClosed => (400, "Bad Request"),
            Timeout => (408, "Request Timeout"),
            RequestTooLarge => (413, "Payload Too Large"),
            BadRequest(_) => (400, "Bad Request"),
            Io(_) => (500, "Internal Server Error"),
        }
    }
}

quick_error! {
    /// Errors from the response writer (C3).
    #[derive(Debug)]
    pub enum WriteError {
        Timeout {
            display("timed out writing response")
        }
        Io(err: io::Error) {
            from()
            display("I/O error: {}", err)
        }
    }
}

quick_error! {
    /// Errors raised while driving a user handler (C5 `DISPATCHING`).
    #[derive(Debug)]
    pub enum HandlerError {
        /// The handler's step-producer failed with an opaque message. The
        /// connection is closed and the failure is logged; the scheduler
        /// is unaffected.
        Failed(message: String) {
            display("handler error: {}", message)
        }
    }
}

impl HttpError for HandlerError {
    fn http_status(&self) -> (u16, &'static str) {
        (500, "Internal Server Error")
    }
}

quick_error! {
    /// WebSocket framing errors (C8).
    #[derive(Debug)]
    pub enum WsError {
        /// Inbound frame missing the mandatory client-to-server mask bit.
        Unmasked {
            display("received an unmasked frame from a client")
        }
        /// A control frame violated FIN=1 or the 125-byte payload cap.
        BadControlFrame {
            display("control frame violates FIN or length invariant")
        }
        /// A reserved bit was set, or the opcode is outside the declared set.
        ReservedBitsOrOpcode {
            display("reserved bits set or opcode unrecognized")
        }
        /// A single frame, or a reassembled fragmented message, exceeded
        /// the configured payload cap.
        MessageTooLarge {
            display("websocket message exceeds configured size limit")
        }
        Closed {
            display("websocket connection closed")
        }
        Io(err: io::Error) {
            from()
            display("I/O error: {}", err)
        }
    }
}

impl HttpError for WsError {
    fn http_status(&self) -> (u16, &'static str) {
        (400, "Bad Request")
    }
}

/// Top-level error a connection coroutine can observe from any phase.
///
/// Unifies C1/C2/C3/C8 errors so [`connection::Connection::poll`]
/// (crate::connection::Connection::poll) can decide, in one place, whether
/// a synthesized response is still possible.
#[derive(Debug)]
pub enum ConnError {
    Read(ReadError),
    Write(WriteError),
    Handler(HandlerError),
    Ws(WsError),
}

impl From<ReadError> for ConnError {
    fn from(e: ReadError) -> Self {
        ConnError::Read(e)
    }
}
impl From<WriteError> for ConnError {
    fn from(e: WriteError) -> Self {
        ConnError::Write(e)
    }
}
impl From<HandlerError> for ConnError {
    fn from(e: HandlerError) -> Self {
        ConnError::Handler(e)
    }
}
impl From<WsError> for ConnError {
    fn from(e: WsError) -> Self {
        ConnError::Ws(e)
    }
}

