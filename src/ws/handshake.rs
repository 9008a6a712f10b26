//! RFC 6455 §4 opening handshake.

use crate::headers::Headers;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha1::{Digest, Sha1};

/// The literal GUID concatenated onto the client's key before hashing.
pub const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes `Sec-WebSocket-Accept` from the client's `Sec-WebSocket-Key`.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Extracts the accept key for a request already confirmed to be an
/// upgrade (`request.is_websocket_upgrade()`); `None` only if the key
/// header is missing, which upgrade detection already rules out.
pub fn accept_key_for(headers: &Headers) -> Option<String> {
    headers.get("Sec-WebSocket-Key").map(accept_key)
}
