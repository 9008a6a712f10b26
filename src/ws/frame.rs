//! RFC 6455 §5 frame parser and emitter (C8).
//!
//! [`FrameReader`] is a resumable computation in the same shape as
//! [`reader::poll_read_until`](crate::reader::poll_read_until): each `poll`
//! does at most one non-blocking `recv` plus header/payload bookkeeping.
//! [`MessageReader`] wraps it to reassemble a fragmented message into the
//! single `(opcode, payload)` pair callers should see.

use crate::error::WsError;
use crate::io::socket::{RecvOutcome, Socket};
use crate::reader::FixedBuf;
use crate::step::Step;

pub const OP_CONTINUATION: u8 = 0x0;
pub const OP_TEXT: u8 = 0x1;
pub const OP_BINARY: u8 = 0x2;
pub const OP_CLOSE: u8 = 0x8;
pub const OP_PING: u8 = 0x9;
pub const OP_PONG: u8 = 0xA;

fn is_control(opcode: u8) -> bool {
    matches!(opcode, OP_CLOSE | OP_PING | OP_PONG)
}

/// One parsed, already-unmasked frame.
#[derive(Debug)]
pub struct Frame {
    pub fin: bool,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

enum Phase {
    /// Waiting for the first two header bytes.
    Basic,
    /// First two bytes known; waiting for `need` extended-length bytes.
    ExtLen { need: usize },
    /// Extended length known; waiting for the 4-byte mask.
    Mask,
    /// Header fully parsed; waiting for `payload_len` payload bytes.
    Payload { fin: bool, opcode: u8, mask: [u8; 4], payload_len: usize },
}

fn poll_fill<S: Socket>(sock: &mut S, buf: &mut FixedBuf, scratch: &mut [u8], target: usize) -> Step<(), WsError> {
    if buf.len() >= target {
        return Step::Done(());
    }
    let want = scratch.len().min(buf.remaining_capacity());
    match sock.recv_into(&mut scratch[..want]) {
        Ok(RecvOutcome::Ready(n)) => {
            assert!(buf.extend_from_slice(&scratch[..n]), "header buffer sized for the largest possible frame header");
            if buf.len() >= target {
                Step::Done(())
            } else {
                Step::Progress
            }
        }
        Ok(RecvOutcome::WouldBlock) => Step::Suspend,
        Ok(RecvOutcome::Closed) => Step::Failed(WsError::Closed),
        Err(e) => Step::Failed(WsError::Io(e)),
    }
}

/// Parses one frame off the wire, unmasking its payload in place.
pub struct FrameReader {
    header_buf: FixedBuf,
    payload_buf: Option<FixedBuf>,
    phase: Phase,
    max_payload: usize,
}

impl FrameReader {
    pub fn new(max_payload: usize) -> FrameReader {
        FrameReader { header_buf: FixedBuf::with_capacity(14), payload_buf: None, phase: Phase::Basic, max_payload }
    }

    pub fn poll<S: Socket>(&mut self, sock: &mut S, scratch: &mut [u8]) -> Step<Frame, WsError> {
        loop {
            match &self.phase {
                Phase::Basic => match poll_fill(sock, &mut self.header_buf, scratch, 2) {
                    Step::Done(()) => {
                        let bytes = self.header_buf.as_slice();
                        let (b0, b1) = (bytes[0], bytes[1]);
                        if b0 & 0x70 != 0 {
                            return Step::Failed(WsError::ReservedBitsOrOpcode);
                        }
                        let opcode = b0 & 0x0F;
                        if !matches!(opcode, OP_CONTINUATION | OP_TEXT | OP_BINARY | OP_CLOSE | OP_PING | OP_PONG) {
                            return Step::Failed(WsError::ReservedBitsOrOpcode);
                        }
                        if b1 & 0x80 == 0 {
                            return Step::Failed(WsError::Unmasked);
                        }
                        let len7 = b1 & 0x7F;
                        if is_control(opcode) && (b0 & 0x80 == 0 || len7 > 125) {
                            return Step::Failed(WsError::BadControlFrame);
                        }
                        let ext_len = match len7 {
                            126 => 2,
                            127 => 8,
                            _ => 0,
                        };
                        self.phase = Phase::ExtLen { need: ext_len };
                    }
                    Step::Progress => return Step::Progress,
                    Step::Suspend => return Step::Suspend,
                    Step::Failed(e) => return Step::Failed(e),
                },
                Phase::ExtLen { need } => {
                    let target = 2 + need;
                    match poll_fill(sock, &mut self.header_buf, scratch, target) {
                        Step::Done(()) => self.phase = Phase::Mask,
                        Step::Progress => return Step::Progress,
                        Step::Suspend => return Step::Suspend,
                        Step::Failed(e) => return Step::Failed(e),
                    }
                }
                Phase::Mask => {
                    let bytes = self.header_buf.as_slice();
                    let len7 = bytes[1] & 0x7F;
                    let ext_len = match len7 {
                        126 => 2,
                        127 => 8,
                        _ => 0,
                    };
                    let target = 2 + ext_len + 4;
                    match poll_fill(sock, &mut self.header_buf, scratch, target) {
                        Step::Done(()) => {
                            let bytes = self.header_buf.as_slice();
                            let fin = bytes[0] & 0x80 != 0;
                            let opcode = bytes[0] & 0x0F;
                            let payload_len: u64 = match len7 {
                                126 => u16::from_be_bytes([bytes[2], bytes[3]]) as u64,
                                127 => u64::from_be_bytes(bytes[2..10].try_into().unwrap()),
                                n => n as u64,
                            };
                            if payload_len > self.max_payload as u64 {
                                return Step::Failed(WsError::MessageTooLarge);
                            }
                            let mask_offset = 2 + ext_len;
                            let mut mask = [0u8; 4];
                            mask.copy_from_slice(&bytes[mask_offset..mask_offset + 4]);
                            self.payload_buf = Some(FixedBuf::with_capacity(payload_len as usize));
                            self.phase = Phase::Payload { fin, opcode, mask, payload_len: payload_len as usize };
                        }
                        Step::Progress => return Step::Progress,
                        Step::Suspend => return Step::Suspend,
                        Step::Failed(e) => return Step::Failed(e),
                    }
                }
                Phase::Payload { fin, opcode, mask, payload_len } => {
                    let (fin, opcode, mask, payload_len) = (*fin, *opcode, *mask, *payload_len);
                    let buf = self.payload_buf.as_mut().expect("payload buffer allocated when entering Payload phase");
                    match poll_fill(sock, buf, scratch, payload_len) {
                        Step::Done(()) => {
                            let mut payload = self.payload_buf.take().unwrap().into_vec();
                            for (i, byte) in payload.iter_mut().enumerate() {
                                *byte ^= mask[i % 4];
                            }
                            self.header_buf.clear();
                            self.phase = Phase::Basic;
                            return Step::Done(Frame { fin, opcode, payload });
                        }
                        Step::Progress => return Step::Progress,
                        Step::Suspend => return Step::Suspend,
                        Step::Failed(e) => return Step::Failed(e),
                    }
                }
            }
        }
    }
}

/// Reassembles fragmented messages (continuation frames) so the caller
/// only ever sees one `(opcode, payload)` pair per logical message.
/// Control frames pass straight through since RFC 6455 forbids fragmenting
/// them.
pub struct MessageReader {
    frame_reader: FrameReader,
    reassembly: Option<(u8, Vec<u8>)>,
    max_payload: usize,
}

impl MessageReader {
    pub fn new(max_payload: usize) -> MessageReader {
        MessageReader { frame_reader: FrameReader::new(max_payload), reassembly: None, max_payload }
    }

    pub fn poll<S: Socket>(&mut self, sock: &mut S, scratch: &mut [u8]) -> Step<(u8, Vec<u8>), WsError> {
        loop {
            match self.frame_reader.poll(sock, scratch) {
                Step::Done(frame) => {
                    if is_control(frame.opcode) {
                        return Step::Done((frame.opcode, frame.payload));
                    }
                    if frame.opcode == OP_CONTINUATION {
                        let (first_opcode, mut acc) = match self.reassembly.take() {
                            Some(pair) => pair,
                            None => return Step::Failed(WsError::ReservedBitsOrOpcode),
                        };
                        if acc.len() + frame.payload.len() > self.max_payload {
                            return Step::Failed(WsError::MessageTooLarge);
                        }
                        acc.extend_from_slice(&frame.payload);
                        if frame.fin {
                            return Step::Done((first_opcode, acc));
                        }
                        self.reassembly = Some((first_opcode, acc));
                        continue;
                    }
                    if frame.fin {
                        return Step::Done((frame.opcode, frame.payload));
                    }
                    self.reassembly = Some((frame.opcode, frame.payload));
                }
                Step::Progress => return Step::Progress,
                Step::Suspend => return Step::Suspend,
                Step::Failed(e) => return Step::Failed(e),
            }
        }
    }
}

/// Builds a server-to-client frame. The server never fragments, so `FIN`
/// is always set; the payload is never masked (§3 invariant).
pub fn encode_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 10);
    out.push(0x80 | opcode);
    let len = payload.len();
    if len < 126 {
        out.push(len as u8);
    } else if len <= u16::MAX as usize {
        out.push(126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
    out.extend_from_slice(payload);
    out
}

/// `send_close(code, reason)`: prepends the 2-byte status code to the
/// reason bytes, per §4.8.
pub fn encode_close(code: u16, reason: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(2 + reason.len());
    payload.extend_from_slice(&code.to_be_bytes());
    payload.extend_from_slice(reason);
    encode_frame(OP_CLOSE, &payload)
}
