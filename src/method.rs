//! Request methods and the method-tag vocabulary routes are registered
//! against (§3, §4.4).
//!
//! A request's literal method is free-form uppercase ASCII (§4.2); it is
//! stored as received. Routing instead matches against the effective
//! method, which is `Method::Websocket` when the upgrade headers are
//! present, or the tag parsed out of the literal method otherwise. A
//! literal `WEBSOCKET` method on the wire is *not* special-cased into
//! `Method::Websocket` — see the open question in §9, resolved in
//! DESIGN.md.

use std::fmt;

/// The method-tag vocabulary a [`Route`](crate::route::Route) can be
/// registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    /// Synthetic tag assigned only via upgrade detection, never by parsing
    /// a literal method token off the wire.
    Websocket,
}

impl Method {
    /// Maps a literal, already-uppercased method token to a route tag.
    /// Returns `None` for methods outside the registrable vocabulary
    /// (including the literal token `"WEBSOCKET"`, which is reserved and
    /// therefore unmatchable here).
    pub fn from_literal(token: &str) -> Option<Method> {
        match token {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            "PATCH" => Some(Method::Patch),
            "HEAD" => Some(Method::Head),
            "OPTIONS" => Some(Method::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Websocket => "WEBSOCKET",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates that `token` is a non-empty run of uppercase ASCII letters, as
/// required for the request-line method (§4.2).
pub fn is_valid_method_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_uppercase())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn literal_websocket_is_reserved() {
        assert_eq!(Method::from_literal("WEBSOCKET"), None);
    }

    #[test]
    fn known_methods_roundtrip() {
        for m in [
            Method::Get,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Patch,
            Method::Head,
            Method::Options,
        ] {
            assert_eq!(Method::from_literal(m.as_str()), Some(m));
        }
    }

    #[test]
    fn unknown_method_passes_through_as_none() {
        assert_eq!(Method::from_literal("PROPFIND"), None);
    }

    #[test]
    fn token_validation() {
        assert!(is_valid_method_token("GET"));
        assert!(is_valid_method_token("PROPFIND"));
        assert!(!is_valid_method_token(""));
        assert!(!is_valid_method_token("Get"));
        assert!(!is_valid_method_token("GET1"));
    }
}
