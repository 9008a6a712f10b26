//! Bounded line/byte reader (C1).
//!
//! [`FixedBuf`] is the single fixed-capacity byte region this crate uses for
//! buffering: bytes are appended in place and shifted down on `consume`,
//! never reallocated. [`poll_read_until`] and [`poll_read_exact`] are the two
//! resumable operations built on top of it — each call does at most one
//! non-blocking `recv` plus a linear scan, then reports a [`Step`].

use crate::error::ReadError;
use crate::io::socket::{RecvOutcome, Socket};
use crate::step::Step;

/// A single, fixed-capacity accumulation buffer.
pub struct FixedBuf {
    data: Box<[u8]>,
    len: usize,
}

impl FixedBuf {
    pub fn with_capacity(cap: usize) -> FixedBuf {
        FixedBuf { data: vec![0u8; cap].into_boxed_slice(), len: 0 }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining_capacity(&self) -> usize {
        self.data.len() - self.len
    }

    /// Appends `bytes`. Returns `false` (and leaves the buffer untouched)
    /// if they would not fit.
    #[must_use]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.remaining_capacity() {
            return false;
        }
        let end = self.len + bytes.len();
        self.data[self.len..end].copy_from_slice(bytes);
        self.len = end;
        true
    }

    /// Drops the first `n` bytes, shifting the remainder to the front.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.len, "consume past buffered length");
        self.data.copy_within(n..self.len, 0);
        self.len -= n;
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// First index at which `needle` occurs, if any.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() || needle.len() > self.len {
            return None;
        }
        self.as_slice().windows(needle.len()).position(|w| w == needle)
    }

    /// Consumes the buffer into an owned, right-sized `Vec`.
    pub fn into_vec(self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

/// Reads until `delim` is present in the buffer, returning the number of
/// bytes that precede it (the delimiter itself is left in the buffer for
/// the caller to `consume`).
pub fn poll_read_until<S: Socket>(
    sock: &mut S,
    buf: &mut FixedBuf,
    scratch: &mut [u8],
    delim: &[u8],
    now: f64,
    deadline: f64,
) -> Step<usize, ReadError> {
    if let Some(pos) = buf.find(delim) {
        return Step::Done(pos);
    }
    if now >= deadline {
        return Step::Failed(ReadError::Timeout);
    }
    if buf.remaining_capacity() == 0 {
        return Step::Failed(ReadError::RequestTooLarge);
    }
    let want = scratch.len().min(buf.remaining_capacity());
    match sock.recv_into(&mut scratch[..want]) {
        Ok(RecvOutcome::Ready(n)) => {
            if !buf.extend_from_slice(&scratch[..n]) {
                return Step::Failed(ReadError::RequestTooLarge);
            }
            match buf.find(delim) {
                Some(pos) => Step::Done(pos),
                None => Step::Progress,
            }
        }
        Ok(RecvOutcome::WouldBlock) => Step::Suspend,
        Ok(RecvOutcome::Closed) => Step::Failed(ReadError::ConnectionClosed),
        Err(e) => Step::Failed(ReadError::Io(e)),
    }
}

/// Reads until the buffer holds at least `n` bytes.
pub fn poll_read_exact<S: Socket>(
    sock: &mut S,
    buf: &mut FixedBuf,
    scratch: &mut [u8],
    n: usize,
    now: f64,
    deadline: f64,
) -> Step<(), ReadError> {
    if buf.len() >= n {
        return Step::Done(());
    }
    if now >= deadline {
        return Step::Failed(ReadError::Timeout);
    }
    if buf.remaining_capacity() == 0 {
        return Step::Failed(ReadError::RequestTooLarge);
    }
    let want = scratch.len().min(buf.remaining_capacity());
    match sock.recv_into(&mut scratch[..want]) {
        Ok(RecvOutcome::Ready(k)) => {
            if !buf.extend_from_slice(&scratch[..k]) {
                return Step::Failed(ReadError::RequestTooLarge);
            }
            if buf.len() >= n {
                Step::Done(())
            } else {
                Step::Progress
            }
        }
        Ok(RecvOutcome::WouldBlock) => Step::Suspend,
        Ok(RecvOutcome::Closed) => Step::Failed(ReadError::ConnectionClosed),
        Err(e) => Step::Failed(ReadError::Io(e)),
    }
}

/// An in-memory [`Socket`](crate::io::socket::Socket) double, used by this
/// crate's own unit tests and exported for a host's integration tests to
/// drive [`Server::turn`](crate::server::Server::turn) end to end without
/// opening a real socket.
pub mod test_socket {
    use crate::io::socket::{RecvOutcome, SendOutcome, Socket};
    use std::collections::VecDeque;
    use std::io;
    use std::net::SocketAddr;

    /// An in-memory [`Socket`] double: a byte queue to read from and a
    /// `Vec` to capture writes into, used by every unit test in this crate
    /// that needs a socket without opening a real one.
    pub struct MockSocket {
        pub inbound: VecDeque<u8>,
        pub outbound: Vec<u8>,
        pub closed: bool,
        pub blocked: bool,
    }

    impl MockSocket {
        pub fn with_input(bytes: &[u8]) -> MockSocket {
            MockSocket {
                inbound: bytes.iter().copied().collect(),
                outbound: Vec::new(),
                closed: false,
                blocked: false,
            }
        }

        pub fn push_input(&mut self, bytes: &[u8]) {
            self.inbound.extend(bytes.iter().copied());
        }
    }

    impl Socket for MockSocket {
        fn recv_into(&mut self, buf: &mut [u8]) -> io::Result<RecvOutcome> {
            if self.blocked {
                return Ok(RecvOutcome::WouldBlock);
            }
            if self.inbound.is_empty() {
                return Ok(if self.closed { RecvOutcome::Closed } else { RecvOutcome::WouldBlock });
            }
            let n = buf.len().min(self.inbound.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.inbound.pop_front().unwrap();
            }
            Ok(RecvOutcome::Ready(n))
        }

        fn send(&mut self, buf: &[u8]) -> io::Result<SendOutcome> {
            if self.blocked {
                return Ok(SendOutcome::WouldBlock);
            }
            self.outbound.extend_from_slice(buf);
            Ok(SendOutcome::Ready(buf.len()))
        }

        fn close(&mut self) -> io::Result<()> {
            self.closed = true;
            Ok(())
        }

        fn set_nonblocking(&mut self, _nonblocking: bool) -> io::Result<()> {
            Ok(())
        }

        fn peer_addr(&self) -> io::Result<SocketAddr> {
            Ok("127.0.0.1:0".parse().unwrap())
        }
    }
}

#[cfg(test)]
mod test {
    use super::test_socket::MockSocket;
    use super::*;

    #[test]
    fn read_until_finds_delimiter_across_multiple_polls() {
        let mut sock = MockSocket::with_input(b"GET / HTTP/1.1\r\n\r\n");
        let mut buf = FixedBuf::with_capacity(64);
        let mut scratch = [0u8; 4]; // force several recv calls
        let mut pos = None;
        for _ in 0..32 {
            match poll_read_until(&mut sock, &mut buf, &mut scratch, b"\r\n", 0.0, 10.0) {
                Step::Done(p) => {
                    pos = Some(p);
                    break;
                }
                Step::Progress | Step::Suspend => continue,
                Step::Failed(e) => panic!("unexpected failure: {:?}", e),
            }
        }
        assert_eq!(pos, Some(14));
        assert_eq!(&buf.as_slice()[..14], b"GET / HTTP/1.1");
    }

    #[test]
    fn oversized_input_yields_request_too_large() {
        let mut sock = MockSocket::with_input(&vec![b'a'; 100]);
        let mut buf = FixedBuf::with_capacity(16);
        let mut scratch = [0u8; 8];
        let mut result = None;
        for _ in 0..10 {
            match poll_read_until(&mut sock, &mut buf, &mut scratch, b"\r\n", 0.0, 10.0) {
                Step::Failed(e) => {
                    result = Some(e);
                    break;
                }
                _ => continue,
            }
        }
        assert!(matches!(result, Some(ReadError::RequestTooLarge)));
    }

    #[test]
    fn expired_deadline_yields_timeout() {
        let mut sock = MockSocket::with_input(b"");
        sock.blocked = true;
        let mut buf = FixedBuf::with_capacity(16);
        let mut scratch = [0u8; 8];
        let step = poll_read_until(&mut sock, &mut buf, &mut scratch, b"\r\n", 11.0, 10.0);
        assert!(matches!(step, Step::Failed(ReadError::Timeout)));
    }

    #[test]
    fn would_block_suspends() {
        let mut sock = MockSocket::with_input(b"");
        sock.blocked = true;
        let mut buf = FixedBuf::with_capacity(16);
        let mut scratch = [0u8; 8];
        let step = poll_read_until(&mut sock, &mut buf, &mut scratch, b"\r\n", 0.0, 10.0);
        assert!(matches!(step, Step::Suspend));
    }

    #[test]
    fn orderly_close_before_any_bytes_is_connection_closed() {
        let mut sock = MockSocket::with_input(b"");
        sock.closed = true;
        let mut buf = FixedBuf::with_capacity(16);
        let mut scratch = [0u8; 8];
        let step = poll_read_until(&mut sock, &mut buf, &mut scratch, b"\r\n", 0.0, 10.0);
        assert!(matches!(step, Step::Failed(ReadError::ConnectionClosed)));
    }

    #[test]
    fn read_exact_accumulates_body_bytes() {
        let mut sock = MockSocket::with_input(b"hello world");
        let mut buf = FixedBuf::with_capacity(32);
        let mut scratch = [0u8; 3];
        let mut done = false;
        for _ in 0..16 {
            if let Step::Done(()) = poll_read_exact(&mut sock, &mut buf, &mut scratch, 11, 0.0, 10.0) {
                done = true;
                break;
            }
        }
        assert!(done);
        assert_eq!(buf.as_slice(), b"hello world");
    }

    #[test]
    fn fixed_buf_consume_shifts_remainder() {
        let mut buf = FixedBuf::with_capacity(8);
        assert!(buf.extend_from_slice(b"abcdef"));
        buf.consume(3);
        assert_eq!(buf.as_slice(), b"def");
    }
}
