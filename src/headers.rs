//! Case-insensitive header map (§3, §4.2).
//!
//! Lookup is case-insensitive; the name as first received is preserved for
//! forwarding. On a duplicate header name only the first value is kept —
//! "first-seen" per the data model invariant.

/// An ordered, case-insensitive multimap that keeps exactly one (the first)
/// value per header name.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

#[inline(always)]
fn eq_ascii_ci(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.bytes().zip(b.bytes()).all(|(x, y)| x.to_ascii_lowercase() == y.to_ascii_lowercase())
}

impl Headers {
    pub fn new() -> Headers {
        Headers { entries: Vec::new() }
    }

    /// Inserts `name: value`, trimming surrounding whitespace from `value`.
    /// If `name` is already present (case-insensitively) the existing value
    /// is kept and this call is a no-op, matching the first-seen rule.
    pub fn insert_first_seen(&mut self, name: &str, value: &str) {
        let value = value.trim();
        if self.get(name).is_some() {
            return;
        }
        self.entries.push((name.to_string(), value.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| eq_ascii_ci(n, name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// True if `name`'s value, split on commas and trimmed, contains `token`
    /// case-insensitively. Used for `Connection: keep-alive`/`close` and
    /// `Upgrade: websocket`.
    pub fn contains_token(&self, name: &str, token: &str) -> bool {
        match self.get(name) {
            Some(value) => value.split(',').map(str::trim).any(|t| eq_ascii_ci(t, token)),
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
