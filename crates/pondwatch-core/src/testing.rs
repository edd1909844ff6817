// In-memory transport for lifecycle tests. Each `open()` consumes the
// next scripted outcome; once the script runs out every attempt fails.
#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::channel::mpsc;
use futures::future::{self, BoxFuture, FutureExt};
use futures::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::time::Instant;
use url::Url;

use pondwatch_api::{Connection, Error, Inbound, Transport};

use crate::client::ConnectionState;

pub(crate) enum Plan {
    Fail,
    Hang,
    Accept,
}

/// Server end of an accepted fake connection.
pub(crate) struct Peer {
    frames: mpsc::UnboundedSender<Result<Inbound, Error>>,
    pub received: mpsc::UnboundedReceiver<String>,
}

impl Peer {
    pub fn push_text(&self, text: impl Into<String>) {
        self.frames.unbounded_send(Ok(Inbound::Text(text.into()))).unwrap();
    }

    pub fn push_close(&self, code: u16, reason: &str) {
        let info = pondwatch_api::CloseInfo {
            code,
            reason: reason.into(),
        };
        self.frames
            .unbounded_send(Ok(Inbound::Close(Some(info))))
            .unwrap();
    }
}

pub(crate) struct FakeTransport {
    script: Mutex<VecDeque<Plan>>,
    opens: Mutex<Vec<(Instant, Url)>>,
    peers: Mutex<VecDeque<Peer>>,
    count: watch::Sender<usize>,
}

impl FakeTransport {
    pub fn new(plans: impl IntoIterator<Item = Plan>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(plans.into_iter().collect()),
            opens: Mutex::new(Vec::new()),
            peers: Mutex::new(VecDeque::new()),
            count: watch::channel(0).0,
        })
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    pub fn open_times(&self) -> Vec<Instant> {
        self.opens.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn urls(&self) -> Vec<Url> {
        self.opens.lock().unwrap().iter().map(|(_, u)| u.clone()).collect()
    }

    pub async fn wait_for_opens(&self, n: usize) {
        let mut rx = self.count.subscribe();
        rx.wait_for(|count| *count >= n).await.unwrap();
    }

    pub fn take_peer(&self) -> Peer {
        self.peers.lock().unwrap().pop_front().unwrap()
    }
}

impl Transport for FakeTransport {
    fn open(&self, url: Url) -> BoxFuture<'static, Result<Connection, Error>> {
        self.opens.lock().unwrap().push((Instant::now(), url));
        self.count.send_modify(|n| *n += 1);

        let plan = self.script.lock().unwrap().pop_front().unwrap_or(Plan::Fail);
        match plan {
            Plan::Fail => {
                future::ready(Err(Error::WebSocketConnect("connection refused".into()))).boxed()
            }
            Plan::Hang => future::pending().boxed(),
            Plan::Accept => {
                let (frames_tx, frames_rx) = mpsc::unbounded();
                let (sent_tx, sent_rx) = mpsc::unbounded::<String>();
                self.peers.lock().unwrap().push_back(Peer {
                    frames: frames_tx,
                    received: sent_rx,
                });
                let conn = Connection {
                    outbound: Box::pin(sent_tx.sink_map_err(|e| Error::WebSocket(e.to_string()))),
                    inbound: frames_rx.boxed(),
                };
                future::ready(Ok(conn)).boxed()
            }
        }
    }
}

/// Record every state a client reports, in order.
pub(crate) fn record_states(
    client: &crate::AlertClient,
) -> Arc<Mutex<Vec<ConnectionState>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.on_state_change(move |s| sink.lock().unwrap().push(*s));
    seen
}

/// Wait until the client reaches `state`.
pub(crate) async fn wait_for_state(client: &crate::AlertClient, state: ConnectionState) {
    let mut rx = client.state_watch();
    rx.wait_for(|s| *s == state).await.unwrap();
}
