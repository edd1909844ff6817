use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Top-level error type for the `pondwatch-api` crate.
///
/// Covers every transport-level failure of the alert stream: endpoint
/// problems, handshake rejection, mid-stream socket errors and timeouts.
/// `pondwatch-core` never surfaces these to its callers directly; they
/// drive the reconnection path instead.
#[derive(Debug, Error)]
pub enum Error {
    // ── Endpoint ────────────────────────────────────────────────────
    /// The endpoint uses a scheme the transport cannot speak.
    #[error("Unsupported endpoint scheme '{0}' (expected ws or wss)")]
    UnsupportedScheme(String),

    // ── Transport ───────────────────────────────────────────────────
    /// WebSocket handshake or connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Server rejected the upgrade request (bad token, missing route, ...).
    #[error("WebSocket handshake rejected (HTTP {status})")]
    HandshakeRejected { status: u16 },

    /// Error on an established socket.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection attempt did not finish in time.
    #[error("Connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

impl Error {
    /// Returns `true` if the server refused the credentials embedded in
    /// the endpoint, so retrying with the same token is unlikely to help.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::HandshakeRejected { status: 401 | 403 })
    }
}

impl From<tungstenite::Error> for Error {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Http(response) => Self::HandshakeRejected {
                status: response.status().as_u16(),
            },
            tungstenite::Error::Url(e) => Self::WebSocketConnect(e.to_string()),
            other => Self::WebSocket(other.to_string()),
        }
    }
}
