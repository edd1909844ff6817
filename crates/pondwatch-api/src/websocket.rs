//! WebSocket transport for the alert hub.
//!
//! Opens a single tokio-tungstenite connection per [`Transport::open`]
//! call and hands back its two halves. Ping/pong and binary frames never
//! leave this module: tungstenite answers pings itself and the hub only
//! speaks JSON text.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//! use pondwatch_api::{Inbound, Transport, WsTransport};
//!
//! let transport = WsTransport::default();
//! let mut conn = transport.open("ws://localhost:5000/hubs/alerts".parse()?).await?;
//!
//! while let Some(Ok(Inbound::Text(text))) = conn.inbound.next().await {
//!     println!("{text}");
//! }
//! ```

use std::time::Duration;

use futures_util::future::{self, BoxFuture};
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use crate::error::Error;
use crate::transport::{CloseInfo, Connection, Inbound, Transport, redacted};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ── WsTransport ──────────────────────────────────────────────────────

/// Production [`Transport`] backed by tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
}

impl WsTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Transport for WsTransport {
    fn open(&self, url: Url) -> BoxFuture<'static, Result<Connection, Error>> {
        let timeout = self.connect_timeout;
        async move {
            match url.scheme() {
                "ws" | "wss" => {}
                other => return Err(Error::UnsupportedScheme(other.to_owned())),
            }

            tracing::debug!(url = %redacted(&url), "Opening WebSocket");

            let (ws_stream, _response) =
                tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str()))
                    .await
                    .map_err(|_| Error::Timeout {
                        timeout_secs: timeout.as_secs(),
                    })??;

            let (write, read) = ws_stream.split();

            let outbound = write.with(|text: String| {
                future::ready(Ok::<_, Error>(Message::text(text)))
            });

            let inbound = read.filter_map(|frame| future::ready(classify_frame(frame)));

            Ok(Connection {
                outbound: Box::pin(outbound),
                inbound: inbound.boxed(),
            })
        }
        .boxed()
    }
}

/// Map a raw tungstenite frame onto what the lifecycle manager cares
/// about. `None` means "skip this frame".
fn classify_frame(
    frame: Result<Message, tungstenite::Error>,
) -> Option<Result<Inbound, Error>> {
    match frame {
        Ok(Message::Text(text)) => Some(Ok(Inbound::Text(text.as_str().to_owned()))),
        Ok(Message::Close(frame)) => {
            let info = frame.map(|cf| CloseInfo {
                code: u16::from(cf.code),
                reason: cf.reason.as_str().to_owned(),
            });
            Some(Ok(Inbound::Close(info)))
        }
        Ok(Message::Ping(_)) => {
            tracing::trace!("WebSocket ping");
            None
        }
        Ok(_) => None,
        Err(e) => Some(Err(Error::from(e))),
    }
}
