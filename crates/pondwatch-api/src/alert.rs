// ── Alert domain types ──
//
// Immutable values built by the codec from inbound frames. The server
// emits PascalCase field names; camelCase is accepted as an alias so
// both serializer settings on the server side decode the same way.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

// ── ResourceId ──────────────────────────────────────────────────────

/// Identifier of an alert, pond or user.
///
/// The backend uses integer keys for most tables but GUID strings for
/// users, so both JSON numbers and JSON strings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Numeric(i64),
    Text(String),
}

impl ResourceId {
    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            Self::Numeric(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(n: i64) -> Self {
        Self::Numeric(n)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

// ── Enumerations ────────────────────────────────────────────────────

/// Water-quality parameter that crossed a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum WaterParameter {
    #[serde(rename = "PHLevel", alias = "phLevel")]
    #[strum(serialize = "PHLevel")]
    Ph,
    #[serde(rename = "TemperatureCelsius", alias = "temperatureCelsius")]
    #[strum(serialize = "TemperatureCelsius")]
    Temperature,
    #[serde(rename = "OxygenLevel", alias = "oxygenLevel")]
    #[strum(serialize = "OxygenLevel")]
    Oxygen,
    #[serde(rename = "AmmoniaLevel", alias = "ammoniaLevel")]
    #[strum(serialize = "AmmoniaLevel")]
    Ammonia,
    #[serde(rename = "NitriteLevel", alias = "nitriteLevel")]
    #[strum(serialize = "NitriteLevel")]
    Nitrite,
    #[serde(rename = "NitrateLevel", alias = "nitrateLevel")]
    #[strum(serialize = "NitrateLevel")]
    Nitrate,
    #[serde(rename = "CarbonHardness", alias = "carbonHardness")]
    #[strum(serialize = "CarbonHardness")]
    CarbonateHardness,
    #[serde(rename = "WaterLevelMeters", alias = "waterLevelMeters")]
    #[strum(serialize = "WaterLevelMeters")]
    WaterLevel,
}

impl WaterParameter {
    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ph => "pH",
            Self::Temperature => "Temperature",
            Self::Oxygen => "Dissolved oxygen",
            Self::Ammonia => "Ammonia",
            Self::Nitrite => "Nitrite",
            Self::Nitrate => "Nitrate",
            Self::CarbonateHardness => "Carbonate hardness",
            Self::WaterLevel => "Water level",
        }
    }

    /// Unit the measured value is expressed in. Empty for pH.
    pub fn unit(self) -> &'static str {
        match self {
            Self::Ph => "",
            Self::Temperature => "°C",
            Self::Oxygen | Self::Ammonia | Self::Nitrite | Self::Nitrate => "mg/L",
            Self::CarbonateHardness => "°dH",
            Self::WaterLevel => "m",
        }
    }
}

/// Direction of the threshold breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum AlertKind {
    #[serde(alias = "high")]
    High,
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "rapidChange")]
    RapidChange,
}

/// Alert severity, ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
pub enum Severity {
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
    #[serde(alias = "urgent")]
    Urgent,
}

impl Severity {
    /// Whether a host should interrupt the user for this alert.
    pub fn is_interruptive(self) -> bool {
        self >= Self::High
    }
}

// ── AlertEvent ──────────────────────────────────────────────────────

/// A water-quality alert pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlertEvent {
    #[serde(alias = "id")]
    pub id: ResourceId,

    /// Resource (pond) the measurement came from.
    #[serde(alias = "pondId")]
    pub pond_id: ResourceId,

    #[serde(default, alias = "pondName")]
    pub pond_name: Option<String>,

    #[serde(alias = "parameterName")]
    pub parameter_name: WaterParameter,

    #[serde(alias = "measuredValue")]
    pub measured_value: f64,

    #[serde(rename = "AlertType", alias = "alertType")]
    pub kind: AlertKind,

    #[serde(alias = "severity")]
    pub severity: Severity,

    #[serde(alias = "message")]
    pub message: String,

    #[serde(alias = "createdAt", deserialize_with = "de_timestamp")]
    pub created_at: DateTime<Utc>,

    #[serde(default, alias = "isResolved")]
    pub is_resolved: bool,

    #[serde(default, alias = "resolvedByUserId")]
    pub resolved_by_user_id: Option<ResourceId>,

    #[serde(default, alias = "resolvedByUserName")]
    pub resolved_by_user_name: Option<String>,
}

// ── AlertResolution ─────────────────────────────────────────────────

/// Payload of an `AlertResolved` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlertResolution {
    #[serde(alias = "alertId", alias = "Id", alias = "id")]
    pub alert_id: ResourceId,

    #[serde(default, alias = "resolvedByUserId")]
    pub resolved_by_user_id: Option<ResourceId>,

    #[serde(default, alias = "resolvedByUserName")]
    pub resolved_by_user_name: Option<String>,

    #[serde(default, alias = "resolvedAt", deserialize_with = "de_opt_timestamp")]
    pub resolved_at: Option<DateTime<Utc>>,
}

// ── Timestamps ──────────────────────────────────────────────────────

/// Parse an RFC 3339 timestamp, or an offset-less ISO timestamp as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

fn de_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'"))),
    }
}
