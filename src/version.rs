//! HTTP version on the wire. This core speaks strict HTTP/1.1 line format
//! (§6); HTTP/1.0 requests are accepted but default to `close` semantics
//! instead of keep-alive.

use std::fmt::{self, Display};

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn parse(token: &str) -> Option<Version> {
        match token {
            "HTTP/1.0" => Some(Version::Http10),
            "HTTP/1.1" => Some(Version::Http11),
            _ => None,
        }
    }

    /// Whether this version defaults to a persistent connection absent an
    /// explicit `Connection` header.
    pub fn keep_alive_by_default(&self) -> bool {
        matches!(self, Version::Http11)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        })
    }
}
