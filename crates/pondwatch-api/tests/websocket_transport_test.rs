// Integration tests for `WsTransport` against a local tokio-tungstenite server.
#![allow(clippy::unwrap_used)]

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use url::Url;

use pondwatch_api::{CloseInfo, Error, Inbound, Transport, WsTransport};

// ── Helpers ─────────────────────────────────────────────────────────

/// Accept one WebSocket client, push `frames`, echo back the first
/// text frame the client sends, then close with `Away`.
async fn serve_once(frames: Vec<String>) -> (Url, tokio::task::JoinHandle<Option<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        for frame in frames {
            ws.send(Message::text(frame)).await.unwrap();
        }

        let received = match ws.next().await {
            Some(Ok(Message::Text(text))) => Some(text.as_str().to_owned()),
            _ => None,
        };

        ws.close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "bye".into(),
        }))
        .await
        .unwrap();

        received
    });

    let url = Url::parse(&format!("ws://{addr}/hubs/alerts")).unwrap();
    (url, handle)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_receives_text_and_close() {
    let (url, server) = serve_once(vec![r#"{"Type":"ReceiveAlert"}"#.into()]).await;

    let mut conn = WsTransport::default().open(url).await.unwrap();

    let first = conn.inbound.next().await.unwrap().unwrap();
    assert_eq!(first, Inbound::Text(r#"{"Type":"ReceiveAlert"}"#.into()));

    conn.outbound.send("hello hub".to_owned()).await.unwrap();

    let close = conn.inbound.next().await.unwrap().unwrap();
    assert_eq!(
        close,
        Inbound::Close(Some(CloseInfo {
            code: 1001,
            reason: "bye".into(),
        }))
    );

    assert_eq!(server.await.unwrap().as_deref(), Some("hello hub"));
}

#[tokio::test]
async fn test_token_reaches_server_in_query() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut seen = None;
        let _ws = tokio_tungstenite::accept_hdr_async(
            stream,
            |req: &tokio_tungstenite::tungstenite::handshake::server::Request,
             resp: tokio_tungstenite::tungstenite::handshake::server::Response| {
                seen = req.uri().query().map(str::to_owned);
                Ok(resp)
            },
        )
        .await
        .unwrap();
        seen
    });

    let base = Url::parse(&format!("ws://{addr}/hubs/alerts")).unwrap();
    let token = secrecy::SecretString::from("abc def".to_owned());
    let url = pondwatch_api::endpoint(&base, Some(&token));

    let _conn = WsTransport::default().open(url).await.unwrap();
    assert_eq!(
        server.await.unwrap().as_deref(),
        Some("access_token=abc+def")
    );
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("ws://{addr}/hubs/alerts")).unwrap();
    let err = WsTransport::default().open(url).await.unwrap_err();
    assert!(matches!(err, Error::WebSocket(_) | Error::WebSocketConnect(_)));
}
