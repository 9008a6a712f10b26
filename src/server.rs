//! Server scheduler (C6).
//!
//! Owns the listening socket and the round-robin set of live connections.
//! [`Server::turn`] is the one operation the host calls: it does one
//! accept attempt, advances every connection by one step, then reaps the
//! closed ones — exactly the three-part tick §4.6 describes, with no
//! sleeping and no hidden work between ticks.

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::io::clock::{Clock, SystemClock};
use crate::io::socket::{Listener, TcpListenerSocket};
use crate::route::Router;
use std::net::SocketAddr;

/// Summary of one [`Server::turn`], useful for the host's own scheduling
/// decisions (e.g. "did anything happen this tick").
#[derive(Debug, Default)]
pub struct TickReport {
    pub accepted: bool,
    pub active_connections: usize,
    pub reaped: usize,
}

/// The cooperative server: a set of connections plus the listening socket,
/// advanced one round at a time by the host's own loop.
pub struct Server<L: Listener> {
    listener: L,
    router: Router,
    config: ServerConfig,
    clock: Box<dyn Clock>,
    connections: Vec<Connection<L::Conn>>,
    stopped: bool,
}

impl Server<TcpListenerSocket> {
    /// Binds the default `std::net`-backed listener.
    pub fn bind(addr: SocketAddr, router: Router, config: ServerConfig) -> std::io::Result<Server<TcpListenerSocket>> {
        let listener = TcpListenerSocket::bind(addr)?;
        Ok(Server::new(listener, router, config))
    }
}

impl<L: Listener> Server<L> {
    pub fn new(listener: L, router: Router, config: ServerConfig) -> Server<L> {
        Server { listener, router, config, clock: Box::new(SystemClock::new()), connections: Vec::new(), stopped: false }
    }

    /// Overrides the clock collaborator, e.g. for deterministic tests.
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    /// Advances the whole server by one tick: one accept attempt, one step
    /// for every live connection, then reaping. Never blocks.
    pub fn turn(&mut self) -> TickReport {
        let mut report = TickReport::default();
        if self.stopped {
            return report;
        }

        match self.listener.accept() {
            Ok(Some((socket, addr))) => {
                log::debug!("{}: accepted", addr);
                let now = self.clock.now_secs();
                self.connections.push(Connection::new(socket, addr, &self.config, now));
                report.accepted = true;
            }
            Ok(None) => {}
            Err(e) => log::warn!("accept failed: {}", e),
        }

        for conn in &mut self.connections {
            if conn.is_closed() {
                continue;
            }
            if let crate::step::Step::Failed(e) = conn.poll(&self.router, &self.config, self.clock.as_ref()) {
                log::debug!("{}: {:?}", conn.peer_addr(), e);
            }
        }

        let before = self.connections.len();
        self.connections.retain(|c| !c.is_closed());
        report.reaped = before - self.connections.len();
        report.active_connections = self.connections.len();
        report
    }

    /// Closes the listening socket and marks every active connection for
    /// closure on its next step. The host should keep calling `turn` until
    /// `active_connections() == 0` to let in-flight writes finish.
    pub fn stop(&mut self) {
        self.stopped = true;
        let _ = self.listener.set_nonblocking(true);
        for conn in &mut self.connections {
            conn.request_close();
        }
    }
}
