//! Socket collaborator contract (§6).
//!
//! The core only ever calls `recv_into`/`send` in non-blocking mode and
//! never expects them to suspend — "would block" is reported as a value,
//! not by parking the caller. [`TcpSocket`] / [`TcpListenerSocket`] are the
//! default implementation over `std::net`, used by [`Server`](crate::Server)
//! unless the host supplies its own.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};

/// Result of one non-blocking `recv` attempt.
#[derive(Debug)]
pub enum RecvOutcome {
    /// `n` bytes were read into the caller's buffer.
    Ready(usize),
    /// No bytes were available right now.
    WouldBlock,
    /// The peer performed an orderly shutdown.
    Closed,
}

/// Result of one non-blocking `send` attempt.
#[derive(Debug)]
pub enum SendOutcome {
    /// `n` bytes were accepted by the socket's send buffer.
    Ready(usize),
    /// The send buffer is full right now.
    WouldBlock,
}

/// One accepted, non-blocking connection.
pub trait Socket {
    fn recv_into(&mut self, buf: &mut [u8]) -> io::Result<RecvOutcome>;
    fn send(&mut self, buf: &[u8]) -> io::Result<SendOutcome>;
    fn close(&mut self) -> io::Result<()>;
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()>;
    fn peer_addr(&self) -> io::Result<SocketAddr>;
}

/// A non-blocking listening socket.
pub trait Listener {
    type Conn: Socket;

    /// One non-blocking accept attempt. `Ok(None)` means would-block.
    fn accept(&mut self) -> io::Result<Option<(Self::Conn, SocketAddr)>>;
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()>;
}

fn classify_would_block(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}

/// Default [`Socket`] over [`std::net::TcpStream`].
pub struct TcpSocket(pub TcpStream);

impl Socket for TcpSocket {
    fn recv_into(&mut self, buf: &mut [u8]) -> io::Result<RecvOutcome> {
        use std::io::Read;
        match self.0.read(buf) {
            Ok(0) => Ok(RecvOutcome::Closed),
            Ok(n) => Ok(RecvOutcome::Ready(n)),
            Err(ref e) if classify_would_block(e) => Ok(RecvOutcome::WouldBlock),
            Err(e) => Err(e),
        }
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<SendOutcome> {
        use std::io::Write;
        match self.0.write(buf) {
            Ok(n) => Ok(SendOutcome::Ready(n)),
            Err(ref e) if classify_would_block(e) => Ok(SendOutcome::WouldBlock),
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.0.shutdown(std::net::Shutdown::Both)
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        self.0.set_nonblocking(nonblocking)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.0.peer_addr()
    }
}

/// Default [`Listener`] over [`std::net::TcpListener`].
pub struct TcpListenerSocket(pub TcpListener);

impl TcpListenerSocket {
    pub fn bind(addr: SocketAddr) -> io::Result<TcpListenerSocket> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(TcpListenerSocket(listener))
    }
}

impl Listener for TcpListenerSocket {
    type Conn = TcpSocket;

    fn accept(&mut self) -> io::Result<Option<(TcpSocket, SocketAddr)>> {
        match self.0.accept() {
            Ok((stream, addr)) => {
                stream.set_nonblocking(true)?;
                Ok(Some((TcpSocket(stream), addr)))
            }
            Err(ref e) if classify_would_block(e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        self.0.set_nonblocking(nonblocking)
    }
}
