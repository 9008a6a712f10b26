//! Query-string decoding (§4.2). The request-target is split at the first
//! `?`; everything after is decoded here into an ordered list of pairs,
//! `+` mapped to space and `%HH` percent-decoded. An invalid escape is a
//! `BadRequest`.

use crate::error::ReadError;

/// Splits a request-target into `(path, query)`, where `query` is `None`
/// when there is no `?`.
pub fn split_target(target: &str) -> (&str, Option<&str>) {
    match target.find('?') {
        Some(idx) => (&target[..idx], Some(&target[idx + 1..])),
        None => (target, None),
    }
}

/// Decodes an `application/x-www-form-urlencoded`-style query string into
/// an ordered list of `(name, value)` pairs.
pub fn decode(query: &str) -> Result<Vec<(String, String)>, ReadError> {
    if query.is_empty() {
        return Ok(Vec::new());
    }
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = match pair.find('=') {
                Some(idx) => (&pair[..idx], &pair[idx + 1..]),
                None => (pair, ""),
            };
            Ok((decode_component(name)?, decode_component(value)?))
        })
        .collect()
}

fn decode_component(raw: &str) -> Result<String, ReadError> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .ok_or(ReadError::BadRequest("truncated percent-escape in query string"))?;
                let value = std::str::from_utf8(hex)
                    .ok()
                    .and_then(|s| u8::from_str_radix(s, 16).ok())
                    .ok_or(ReadError::BadRequest("invalid percent-escape in query string"))?;
                out.push(value);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| ReadError::BadRequest("query string is not valid utf-8"))
}
