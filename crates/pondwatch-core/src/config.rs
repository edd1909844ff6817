// ── Runtime client configuration ──
//
// Describes *where* the alert hub lives and how hard to try reconnecting.
// Never touches disk; `pondwatch-config` builds one from TOML/env and
// hands it in.

use std::time::Duration;

use url::Url;

use crate::backoff::BackoffPolicy;

/// Default hub endpoint for a locally running backend.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:5000/hubs/alerts";

/// Configuration for a single [`AlertClient`](crate::AlertClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base WebSocket URL; the access token is appended per attempt.
    pub endpoint: Url,
    /// Reconnection backoff and attempt ceiling.
    pub backoff: BackoffPolicy,
    /// Upper bound on a single connection handshake.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            backoff: BackoffPolicy::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        let endpoint = Url::parse(DEFAULT_ENDPOINT)
            .unwrap_or_else(|_| unreachable!("DEFAULT_ENDPOINT is a valid URL"));
        Self::new(endpoint)
    }
}
