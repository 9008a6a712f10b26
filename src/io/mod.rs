//! External collaborators (§6): the socket, filesystem and clock traits the
//! core drives, plus a default non-blocking implementation of each over
//! `std::net` and `std::fs` so the crate is directly runnable. A host on
//! genuinely constrained hardware swaps these for its own.

pub mod clock;
pub mod fs;
pub mod socket;

pub use clock::{Clock, SystemClock};
pub use fs::{FileStream, Filesystem, StdFilesystem};
pub use socket::{Listener, RecvOutcome, SendOutcome, Socket, TcpListenerSocket, TcpSocket};
