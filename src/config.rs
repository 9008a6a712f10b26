//! Server-wide configuration.
//!
//! Every field here is an upper bound on some fixed-capacity buffer, so the
//! whole set doubles as the memory budget of a single connection (see the
//! crate-level docs). Values are immutable once a [`Server`](crate::Server)
//! is built from them.

/// Bounds and timeouts shared by every connection a [`Server`](crate::Server)
/// accepts.
///
/// Construct with [`ServerConfig::default`] and override individual fields,
/// or go through [`ServerConfigBuilder`] when you prefer a fluent style.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Byte cap on the request line plus the whole header block.
    pub max_request_line_size: usize,
    /// Byte cap on the request body (`Content-Length` is rejected above this).
    pub max_body_bytes: usize,
    /// Wall-clock budget, in seconds, for one request/response cycle.
    pub request_timeout_seconds: u32,
    /// Listen backlog passed to the socket collaborator on bind.
    pub backlog: u32,
    /// Size of the scratch buffer used for a single non-blocking `recv`.
    pub recv_buffer_size: usize,
    /// Size of the coalescing buffer used for outgoing status line, headers
    /// and small body chunks.
    pub send_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            max_request_line_size: 2048,
            max_body_bytes: 16384,
            request_timeout_seconds: 10,
            backlog: 128,
            recv_buffer_size: 4096,
            send_buffer_size: 4096,
        }
    }
}

impl ServerConfig {
    /// Per-connection memory ceiling implied by this configuration, not
    /// counting whatever the handler itself allocates.
    pub fn connection_memory_bound(&self) -> usize {
        self.recv_buffer_size
            + self.send_buffer_size
            + self.max_request_line_size
            + self.max_body_bytes
    }

    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder(ServerConfig::default())
    }
}

/// Fluent builder over [`ServerConfig`].
pub struct ServerConfigBuilder(ServerConfig);

impl ServerConfigBuilder {
    pub fn max_request_line_size(mut self, n: usize) -> Self {
        self.0.max_request_line_size = n;
        self
    }
    pub fn max_body_bytes(mut self, n: usize) -> Self {
        self.0.max_body_bytes = n;
        self
    }
    pub fn request_timeout_seconds(mut self, n: u32) -> Self {
        self.0.request_timeout_seconds = n;
        self
    }
    pub fn backlog(mut self, n: u32) -> Self {
        self.0.backlog = n;
        self
    }
    pub fn recv_buffer_size(mut self, n: usize) -> Self {
        self.0.recv_buffer_size = n;
        self
    }
    pub fn send_buffer_size(mut self, n: usize) -> Self {
        self.0.send_buffer_size = n;
        self
    }
    pub fn build(self) -> ServerConfig {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::ServerConfig;

    #[test]
    fn defaults_match_spec() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.max_request_line_size, 2048);
        assert_eq!(cfg.max_body_bytes, 16384);
        assert_eq!(cfg.request_timeout_seconds, 10);
    }

    #[test]
    fn builder_overrides_only_named_fields() {
        let cfg = ServerConfig::builder().max_body_bytes(1024).build();
        assert_eq!(cfg.max_body_bytes, 1024);
        assert_eq!(cfg.max_request_line_size, 2048);
    }
}
