// ── Transport seam ──
//
// The lifecycle manager only ever talks to a `Transport`: it asks for a
// connection, writes text into the outbound sink and reads `Inbound`
// items until the stream ends. `WsTransport` is the production
// implementation; tests plug in an in-memory one.

use std::pin::Pin;

use futures_util::future::BoxFuture;
use futures_util::sink::Sink;
use futures_util::stream::BoxStream;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;

/// Query parameter carrying the bearer token on the upgrade request.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Close frame details reported by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

/// One item read from an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame.
    Text(String),
    /// The peer sent a close frame.
    Close(Option<CloseInfo>),
}

/// Outbound half of a connection.
pub type OutboundSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Inbound half of a connection. Ends when the socket is gone.
pub type InboundStream = BoxStream<'static, Result<Inbound, Error>>;

/// An open physical connection, already split into its two halves.
pub struct Connection {
    pub outbound: OutboundSink,
    pub inbound: InboundStream,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Something that can open a connection to the alert hub.
pub trait Transport: Send + Sync + 'static {
    /// Open a connection to `url`. Resolves once the handshake is done.
    fn open(&self, url: Url) -> BoxFuture<'static, Result<Connection, Error>>;
}

/// Build the endpoint for a connection attempt.
///
/// When a token is present it is appended as the `access_token` query
/// parameter (percent-encoded). Without a token the bare endpoint is
/// returned and the server decides whether to accept it.
pub fn endpoint(base: &Url, token: Option<&SecretString>) -> Url {
    let mut url = base.clone();
    if let Some(token) = token {
        url.query_pairs_mut()
            .append_pair(ACCESS_TOKEN_PARAM, token.expose_secret());
    }
    url
}

/// Render an endpoint for logs with any token stripped.
pub fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
