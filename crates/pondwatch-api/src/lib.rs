// pondwatch-api: Wire codec and WebSocket transport for the realtime alert stream

pub mod alert;
pub mod codec;
pub mod error;
pub mod transport;
pub mod websocket;

pub use alert::{AlertEvent, AlertKind, AlertResolution, ResourceId, Severity, WaterParameter};
pub use codec::{DecodeError, InboundMessage, decode_frame};
pub use error::Error;
pub use transport::{CloseInfo, Connection, Inbound, Transport, endpoint, redacted};
pub use websocket::WsTransport;
