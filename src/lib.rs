//! A cooperative, non-blocking HTTP/1.1 server core with optional RFC 6455
//! WebSocket support, built for single-core, memory-constrained hosts that
//! have no preemptive runtime and no async executor.
//!
//! Every connection is a [`step::Step`]-producing state machine: advancing
//! it performs one bounded unit of work and either reports progress,
//! reports that it is waiting on I/O, or completes. The [`Server`] scheduler
//! round-robins these machines, doing exactly one non-blocking accept and
//! one step per active connection on each call to [`Server::turn`]. Nothing
//! in this crate spawns a thread or blocks a syscall.
#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate matches;

pub mod config;
pub mod connection;
pub mod error;
pub mod headers;
pub mod io;
pub mod method;
pub mod query;
pub mod reader;
pub mod request;
pub mod response;
pub mod route;
pub mod server;
pub mod static_file;
pub mod step;
pub mod version;
pub mod ws;

pub use config::ServerConfig;
pub use error::{ConnError, HttpError};
pub use method::Method;
pub use request::Request;
pub use response::Response;
pub use route::{HandlerOutcome, Router};
pub use server::Server;
pub use step::{Poll, Step};
pub use version::Version;
