//! Inbound frame decoding.
//!
//! Every text frame the alert hub pushes is a JSON object in one of three
//! shapes:
//!
//! - `{ "Type": "ReceiveAlert", "Data": { ...alert fields... } }`
//! - `{ "Type": "AlertResolved", "Data": { ...resolution fields... } }`
//! - a bare alert object without any discriminator (older servers)
//!
//! Key casing is not stable across server versions, so the discriminator
//! key is matched case-insensitively and the payload is looked up under
//! both `Data` and `data`. Anything else decodes to
//! [`InboundMessage::Unrecognized`] so the caller can log it and move on.
//! The codec performs no I/O.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::alert::{AlertEvent, AlertResolution};

const RECEIVE_ALERT: &str = "ReceiveAlert";
const ALERT_RESOLVED: &str = "AlertResolved";

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    AlertReceived(AlertEvent),
    AlertResolved(AlertResolution),
    /// Valid JSON that matches none of the known shapes.
    Unrecognized(Value),
}

/// A frame that could not be decoded. Never fatal to the connection.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not JSON at all.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The frame named a known message type but its payload did not fit.
    #[error("invalid {message_type} payload: {source}")]
    InvalidPayload {
        message_type: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Envelope shape, resolved from the discriminator before any payload
/// deserialization happens.
enum Envelope<'a> {
    ReceiveAlert(&'a Value),
    AlertResolved(&'a Value),
    Legacy(&'a Value),
    Unknown,
}

/// Decode a raw text frame into an [`InboundMessage`].
pub fn decode_frame(text: &str) -> Result<InboundMessage, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::Malformed)?;

    let Some(object) = value.as_object() else {
        return Ok(InboundMessage::Unrecognized(value));
    };

    match classify(object, &value) {
        Envelope::ReceiveAlert(payload) => AlertEvent::deserialize(payload)
            .map(InboundMessage::AlertReceived)
            .map_err(|source| DecodeError::InvalidPayload {
                message_type: RECEIVE_ALERT,
                source,
            }),
        Envelope::AlertResolved(payload) => AlertResolution::deserialize(payload)
            .map(InboundMessage::AlertResolved)
            .map_err(|source| DecodeError::InvalidPayload {
                message_type: ALERT_RESOLVED,
                source,
            }),
        Envelope::Legacy(payload) => AlertEvent::deserialize(payload)
            .map(InboundMessage::AlertReceived)
            .map_err(|source| DecodeError::InvalidPayload {
                message_type: "legacy alert",
                source,
            }),
        Envelope::Unknown => Ok(InboundMessage::Unrecognized(value.clone())),
    }
}

fn classify<'a>(object: &'a Map<String, Value>, frame: &'a Value) -> Envelope<'a> {
    let discriminator = object
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("type"))
        .map(|(_, v)| v);

    let Some(discriminator) = discriminator else {
        return Envelope::Legacy(frame);
    };

    let payload = object
        .get("Data")
        .or_else(|| object.get("data"))
        .unwrap_or(frame);

    match discriminator.as_str() {
        Some(t) if t.eq_ignore_ascii_case(RECEIVE_ALERT) => Envelope::ReceiveAlert(payload),
        Some(t) if t.eq_ignore_ascii_case(ALERT_RESOLVED) => Envelope::AlertResolved(payload),
        _ => Envelope::Unknown,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::alert::{AlertKind, ResourceId, Severity, WaterParameter};

    fn alert_fields() -> Value {
        json!({
            "Id": 1842,
            "PondId": 12,
            "PondName": "Nursery 3",
            "ParameterName": "OxygenLevel",
            "MeasuredValue": 3.1,
            "AlertType": "Low",
            "Severity": "Urgent",
            "Message": "Dissolved oxygen below 4.0 mg/L",
            "CreatedAt": "2025-06-14T04:12:09.413Z",
            "IsResolved": false,
            "ResolvedByUserId": null,
            "ResolvedByUserName": null
        })
    }

    #[test]
    fn receive_alert_envelope_decodes_nested_payload() {
        let frame = json!({ "Type": "ReceiveAlert", "Data": alert_fields() });

        let InboundMessage::AlertReceived(alert) = decode_frame(&frame.to_string()).unwrap()
        else {
            panic!("expected an alert");
        };

        assert_eq!(alert.id, ResourceId::Numeric(1842));
        assert_eq!(alert.pond_id, ResourceId::Numeric(12));
        assert_eq!(alert.pond_name.as_deref(), Some("Nursery 3"));
        assert_eq!(alert.parameter_name, WaterParameter::Oxygen);
        assert_eq!(alert.kind, AlertKind::Low);
        assert_eq!(alert.severity, Severity::Urgent);
        assert!(!alert.is_resolved);
        assert!(alert.resolved_by_user_id.is_none());
    }

    #[test]
    fn bare_alert_decodes_like_enveloped_alert() {
        let enveloped = json!({ "Type": "ReceiveAlert", "Data": alert_fields() });
        let bare = alert_fields();

        assert_eq!(
            decode_frame(&enveloped.to_string()).unwrap(),
            decode_frame(&bare.to_string()).unwrap()
        );
    }

    #[test]
    fn camel_case_keys_are_accepted() {
        let frame = json!({
            "type": "ReceiveAlert",
            "data": {
                "id": 5,
                "pondId": 2,
                "parameterName": "phLevel",
                "measuredValue": 9.4,
                "alertType": "High",
                "severity": "medium",
                "message": "pH above 9.0",
                "createdAt": "2025-06-14T04:12:09",
                "isResolved": false
            }
        });

        let InboundMessage::AlertReceived(alert) = decode_frame(&frame.to_string()).unwrap()
        else {
            panic!("expected an alert");
        };
        assert_eq!(alert.parameter_name, WaterParameter::Ph);
        assert_eq!(alert.severity, Severity::Medium);
        assert!(alert.pond_name.is_none());
    }

    #[test]
    fn discriminator_key_is_case_insensitive() {
        let frame = json!({ "TYPE": "ReceiveAlert", "Data": alert_fields() });
        assert!(matches!(
            decode_frame(&frame.to_string()).unwrap(),
            InboundMessage::AlertReceived(_)
        ));
    }

    #[test]
    fn alert_resolved_envelope() {
        let frame = json!({
            "Type": "AlertResolved",
            "Data": {
                "AlertId": 1842,
                "ResolvedByUserId": "4c1d8a7e-2f0b-4d53-9a34-1f5b1e0c9d11",
                "ResolvedByUserName": "j.okafor",
                "ResolvedAt": "2025-06-14T05:01:00Z"
            }
        });

        let InboundMessage::AlertResolved(res) = decode_frame(&frame.to_string()).unwrap() else {
            panic!("expected a resolution");
        };
        assert_eq!(res.alert_id, ResourceId::Numeric(1842));
        assert_eq!(res.resolved_by_user_name.as_deref(), Some("j.okafor"));
        assert!(res.resolved_at.is_some());
    }

    #[test]
    fn payload_falls_back_to_frame_without_data_key() {
        let frame = json!({ "type": "AlertResolved", "alertId": 9 });
        let InboundMessage::AlertResolved(res) = decode_frame(&frame.to_string()).unwrap() else {
            panic!("expected a resolution");
        };
        assert_eq!(res.alert_id, ResourceId::Numeric(9));
    }

    #[test]
    fn unknown_type_is_unrecognized() {
        let frame = json!({ "Type": "Heartbeat", "Data": {} });
        assert_eq!(
            decode_frame(&frame.to_string()).unwrap(),
            InboundMessage::Unrecognized(frame)
        );
    }

    #[test]
    fn non_object_json_is_unrecognized() {
        assert_eq!(
            decode_frame("[1,2,3]").unwrap(),
            InboundMessage::Unrecognized(json!([1, 2, 3]))
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            decode_frame("not json at all"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn bad_payload_names_the_message_type() {
        let frame = json!({ "Type": "ReceiveAlert", "Data": { "Id": 1 } });
        let err = decode_frame(&frame.to_string()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidPayload {
                message_type: "ReceiveAlert",
                ..
            }
        ));
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let mut fields = alert_fields();
        fields["ParameterName"] = json!("Salinity");
        assert!(decode_frame(&fields.to_string()).is_err());
    }
}
