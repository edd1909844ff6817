// ── Session adapter boundary ──
//
// The host application owns authentication. It tells the alert client
// about sign-in, token refresh and sign-out through `SessionEvent`s, and
// the client maps them onto start/stop.

use futures_util::{Stream, StreamExt};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::AlertClient;

/// Authentication lifecycle change reported by the host.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A user signed in; connect with their token.
    SignedIn(SecretString),
    /// The token was renewed; later reconnects use the new one.
    TokenRefreshed(SecretString),
    /// The user signed out; disconnect and forget everything.
    SignedOut,
}

impl AlertClient {
    /// Apply one session event.
    pub fn apply_session(&self, event: SessionEvent) {
        match event {
            SessionEvent::SignedIn(token) => self.start(Some(token)),
            SessionEvent::TokenRefreshed(token) => self.update_token(Some(token)),
            SessionEvent::SignedOut => self.stop(),
        }
    }
}

/// Feed session events into `client` until the stream ends or `cancel`
/// fires, then stop the client.
pub async fn drive_session<S>(client: AlertClient, events: S, cancel: CancellationToken)
where
    S: Stream<Item = SessionEvent> + Send,
{
    let mut events = std::pin::pin!(events);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.next() => match event {
                Some(event) => {
                    debug!(?event, "Session event");
                    client.apply_session(event);
                }
                None => break,
            },
        }
    }

    client.stop();
}
