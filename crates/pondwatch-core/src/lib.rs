//! Realtime alert delivery for pondwatch hosts.
//!
//! - **[`AlertClient`]**: owns the single connection to the alert hub and
//!   its state machine (`Disconnected → Connecting → Connected →
//!   Reconnecting`). Survives network blips with exponential backoff and
//!   gives up after [`BackoffPolicy::max_attempts`] until told to
//!   [`retry()`](AlertClient::retry).
//!
//! - **[`SubscriberRegistry`]**: ordered, failure-isolated fan-out of
//!   alerts, resolutions and state changes to any number of handlers.
//!
//! - **[`SessionEvent`]**: how the host's authentication lifecycle drives
//!   `start`/`stop` without the client knowing anything about login.

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod session;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backoff::BackoffPolicy;
pub use client::{AlertClient, ConnectionState};
pub use config::{ClientConfig, DEFAULT_ENDPOINT};
pub use error::ClientError;
pub use registry::{SubscriberRegistry, Subscription};
pub use session::{SessionEvent, drive_session};

// Re-export the alert types so hosts only need this crate.
pub use pondwatch_api::{
    AlertEvent, AlertKind, AlertResolution, DecodeError, InboundMessage, ResourceId, Severity,
    Transport, WaterParameter, WsTransport, decode_frame,
};
