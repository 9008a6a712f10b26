//! WebSocket upgrade & frame engine (C8).

pub mod frame;
pub mod handshake;

use crate::error::WsError;
use crate::io::socket::Socket;
use crate::response::SendBuffer;
use crate::step::Step;
use frame::{encode_close, encode_frame, MessageReader, OP_CLOSE, OP_PING, OP_PONG, OP_TEXT};

/// One complete, decoded message delivered to a [`WsApp`].
pub struct WsMessage {
    pub opcode: u8,
    pub payload: Vec<u8>,
}

/// What a [`WsApp`] wants to happen after seeing a message.
pub enum WsAction {
    /// Send a frame back (e.g. an echo reply, or a pong).
    Send { opcode: u8, payload: Vec<u8> },
    /// Nothing to send.
    None,
    /// Close the connection with this status code and reason.
    Close { code: u16, reason: Vec<u8> },
}

/// The user-supplied driver for one open WebSocket connection, surfaced
/// after the upgrade handshake completes. Modeled as a synchronous
/// callback rather than the fully generic "generator-of-steps" handler
/// shape §3 describes for HTTP routes, since every WebSocket echo/control
/// reaction in this system is itself one bounded unit of work — see
/// the design ledger for the trade-off.
pub trait WsApp {
    fn on_message(&mut self, msg: WsMessage) -> WsAction;
}

enum State {
    Open,
    Closing,
    Closed,
}

/// Drives the WebSocket half-duplex-turned-full-duplex exchange once a
/// connection is in `WS_OPEN`: reads one message, hands it to the app,
/// writes whatever action comes back, and answers control frames per
/// RFC 6455 §5.5 without involving the app at all.
pub struct WsConnection {
    reader: MessageReader,
    app: Box<dyn WsApp>,
    state: State,
    pending_send: SendBuffer,
}

impl WsConnection {
    pub fn new(max_payload: usize, app: Box<dyn WsApp>) -> WsConnection {
        WsConnection { reader: MessageReader::new(max_payload), app, state: State::Open, pending_send: SendBuffer::with_capacity(max_payload) }
    }

    /// Advances the connection by one bounded step. `Step::Done(())`
    /// means the close handshake finished and the socket may be torn
    /// down; `Step::Failed` means the connection must be closed
    /// immediately without a clean handshake.
    pub fn poll<S: Socket>(&mut self, sock: &mut S, scratch: &mut [u8]) -> Step<(), WsError> {
        if !self.pending_send.is_empty() {
            return self.flush_pending(sock);
        }
        match self.state {
            State::Closed => Step::Done(()),
            State::Closing => self.flush_pending(sock),
            State::Open => match self.reader.poll(sock, scratch) {
                Step::Done((opcode, payload)) => {
                    self.handle_message(opcode, payload);
                    Step::Progress
                }
                Step::Progress => Step::Progress,
                Step::Suspend => Step::Suspend,
                Step::Failed(e) => Step::Failed(e),
            },
        }
    }

    fn handle_message(&mut self, opcode: u8, payload: Vec<u8>) {
        match opcode {
            OP_PING => self.pending_send.queue(&encode_frame(OP_PONG, &payload)),
            OP_PONG => {}
            OP_CLOSE => {
                self.pending_send.queue(&encode_close(1000, b""));
                self.state = State::Closing;
            }
            _ => match self.app.on_message(WsMessage { opcode, payload }) {
                WsAction::Send { opcode, payload } => self.pending_send.queue(&encode_frame(opcode, &payload)),
                WsAction::None => {}
                WsAction::Close { code, reason } => {
                    self.pending_send.queue(&encode_close(code, &reason));
                    self.state = State::Closing;
                }
            },
        }
    }

    /// Flushes queued frames through the same [`SendBuffer`] primitive C3
    /// uses for response heads and small body chunks.
    fn flush_pending<S: Socket>(&mut self, sock: &mut S) -> Step<(), WsError> {
        match self.pending_send.poll_flush(sock) {
            Step::Done(()) => match self.state {
                State::Closing => {
                    self.state = State::Closed;
                    Step::Done(())
                }
                State::Open => Step::Progress,
                State::Closed => Step::Done(()),
            },
            Step::Progress => Step::Progress,
            Step::Suspend => Step::Suspend,
            Step::Failed(e) => Step::Failed(WsError::Io(e)),
        }
    }
}

/// Convenience app that echoes every text frame back with an `"Echo: "`
/// prefix, matching the literal end-to-end scenario.
pub struct EchoApp;

impl WsApp for EchoApp {
    fn on_message(&mut self, msg: WsMessage) -> WsAction {
        if msg.opcode == OP_TEXT {
            let mut reply = b"Echo: ".to_vec();
            reply.extend_from_slice(&msg.payload);
            WsAction::Send { opcode: OP_TEXT, payload: reply }
        } else {
            WsAction::Send { opcode: msg.opcode, payload: msg.payload }
        }
    }
}
