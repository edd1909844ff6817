// ── Core error types ──
//
// Misuse and serialization failures reported to callers of `AlertClient`.
// Transport failures never show up here: they drive the reconnection
// state machine instead and are only visible as state transitions.

use thiserror::Error;

use crate::client::ConnectionState;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum ClientError {
    /// `send()` while the connection is not open. The payload is dropped.
    #[error("Not connected to the alert hub (state: {state})")]
    NotConnected { state: ConnectionState },

    /// `retry()` after `stop()`; the caller has to `start()` again.
    #[error("Alert client was stopped -- call start() with a token first")]
    Stopped,

    /// The client was built outside a Tokio runtime.
    #[error("No Tokio runtime available to run the alert connection")]
    NoRuntime,

    /// The outbound payload could not be serialized.
    #[error("Failed to serialize outbound payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
