//! Request parser (C2).
//!
//! The actual byte-level reading is driven by [`connection::Connection`]
//! through [`reader::poll_read_until`]/[`reader::poll_read_exact`], one
//! line or one fixed chunk at a time so every step stays bounded; this
//! module holds the parsing rules those lines are fed through once they
//! are available.

use crate::error::ReadError;
use crate::headers::Headers;
use crate::method::{is_valid_method_token, Method};
use crate::query;
use crate::version::Version;

/// A fully parsed request, owned independently of the connection's
/// read buffers so it can be handed to a handler and outlive the step
/// that produced it.
#[derive(Debug, Clone)]
pub struct Request {
    /// The literal method token as received, uppercased ASCII.
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub version: Version,
}

impl Request {
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// True when the upgrade headers required by §4.2 are all present:
    /// `Upgrade: websocket`, `Connection: Upgrade`, `Sec-WebSocket-Key`.
    pub fn is_websocket_upgrade(&self) -> bool {
        self.headers.contains_token("Upgrade", "websocket")
            && self.headers.contains_token("Connection", "upgrade")
            && self.headers.contains("Sec-WebSocket-Key")
    }

    /// The method the route table matches against: `Websocket` when the
    /// upgrade headers are present (§9 open question, reserved), otherwise
    /// the tag for the literal method token, or `None` for an unrecognized
    /// one (which can never match a registered route).
    pub fn effective_method(&self) -> Option<Method> {
        if self.is_websocket_upgrade() {
            Some(Method::Websocket)
        } else {
            Method::from_literal(&self.method)
        }
    }

    /// Whether the connection should stay open after this response,
    /// absent any override from the response itself (§4.5).
    pub fn wants_keep_alive(&self) -> bool {
        match self.headers.get("Connection") {
            Some(_) if self.headers.contains_token("Connection", "close") => false,
            Some(_) if self.headers.contains_token("Connection", "keep-alive") => true,
            _ => self.version.keep_alive_by_default(),
        }
    }
}

/// Parsed request line, before headers are known.
pub struct RequestLine {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub version: Version,
}

/// Parses `METHOD SP request-target SP HTTP-VERSION` (no trailing CRLF).
pub fn parse_request_line(line: &str) -> Result<RequestLine, ReadError> {
    let mut parts = line.splitn(3, ' ');
    let method = parts.next().unwrap_or("");
    let target = parts.next().ok_or(ReadError::BadRequest("malformed request line"))?;
    let version_token = parts.next().ok_or(ReadError::BadRequest("malformed request line"))?;

    if !is_valid_method_token(method) {
        return Err(ReadError::BadRequest("method is not uppercase ASCII"));
    }
    let version = Version::parse(version_token).ok_or(ReadError::BadRequest("unsupported HTTP version"))?;

    let (path, raw_query) = query::split_target(target);
    let query = match raw_query {
        Some(q) => query::decode(q)?,
        None => Vec::new(),
    };

    Ok(RequestLine { method: method.to_string(), path: path.to_string(), query, version })
}

/// Parses one `Name: value` header line. Continuation lines (leading
/// whitespace, i.e. obsolete header folding) are rejected per §4.2.
pub fn parse_header_line(line: &str) -> Result<(&str, &str), ReadError> {
    if line.starts_with(' ') || line.starts_with('\t') {
        return Err(ReadError::BadRequest("header continuation lines are not supported"));
    }
    let colon = line.find(':').ok_or(ReadError::BadRequest("header line missing ':'"))?;
    let name = &line[..colon];
    if name.is_empty() || name.contains(' ') {
        return Err(ReadError::BadRequest("invalid header name"));
    }
    let value = &line[colon + 1..];
    Ok((name, value))
}

/// Validates and extracts `Content-Length`, enforcing the `max_body_bytes`
/// cap. Absence means a zero-length body.
pub fn content_length(headers: &Headers, max_body_bytes: usize) -> Result<usize, ReadError> {
    match headers.get("Content-Length") {
        None => Ok(0),
        Some(raw) => {
            let n: u64 = raw
                .parse()
                .map_err(|_| ReadError::BadRequest("Content-Length is not a non-negative integer"))?;
            if n > max_body_bytes as u64 {
                return Err(ReadError::RequestTooLarge);
            }
            Ok(n as usize)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_a_simple_get_line() {
        let rl = parse_request_line("GET /hello?name=world HTTP/1.1").unwrap();
        assert_eq!(rl.method, "GET");
        assert_eq!(rl.path, "/hello");
        assert_eq!(rl.query, vec![("name".to_string(), "world".to_string())]);
        assert_eq!(rl.version, Version::Http11);
    }

    #[test]
    fn rejects_lowercase_method() {
        assert!(parse_request_line("get / HTTP/1.1").is_err());
    }

    #[test]
    fn rejects_malformed_request_line() {
        assert!(parse_request_line("GET /").is_err());
        assert!(parse_request_line("GET / BOGUS/9").is_err());
    }

    #[test]
    fn header_line_splits_on_first_colon() {
        let (name, value) = parse_header_line("X-Custom: a:b:c").unwrap();
        assert_eq!(name, "X-Custom");
        assert_eq!(value, " a:b:c");
    }

    #[test]
    fn continuation_lines_are_rejected() {
        assert!(parse_header_line("    folded value").is_err());
        assert!(parse_header_line("\tfolded value").is_err());
    }

    #[test]
    fn content_length_enforces_cap() {
        let mut h = Headers::new();
        h.insert_first_seen("Content-Length", "1000000");
        assert!(matches!(content_length(&h, 16384), Err(ReadError::RequestTooLarge)));
    }

    #[test]
    fn content_length_absent_is_zero() {
        let h = Headers::new();
        assert_eq!(content_length(&h, 16384).unwrap(), 0);
    }

    #[test]
    fn websocket_upgrade_requires_all_three_headers() {
        let mut h = Headers::new();
        h.insert_first_seen("Upgrade", "websocket");
        h.insert_first_seen("Connection", "Upgrade");
        h.insert_first_seen("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==");
        let req = Request {
            method: "GET".into(),
            path: "/ws".into(),
            query: Vec::new(),
            headers: h,
            body: Vec::new(),
            version: Version::Http11,
        };
        assert!(req.is_websocket_upgrade());
    }

    #[test]
    fn keep_alive_defaults_follow_version_absent_header() {
        let req = Request {
            method: "GET".into(),
            path: "/".into(),
            query: Vec::new(),
            headers: Headers::new(),
            body: Vec::new(),
            version: Version::Http11,
        };
        assert!(req.wants_keep_alive());

        let req10 = Request { version: Version::Http10, ..req.clone() };
        assert!(!req10.wants_keep_alive());
    }
}
