//! Domain model for line suspensions and the alert state
//!
//! `Suspension` is the wire payload broadcast by the broker. `AlertState`
//! is what UI consumers read: the current suspension (if any), the
//! connection state and the last advisory error.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Implements common traits for ID types
macro_rules! impl_id_type {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name::new(s)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                WireId::deserialize(deserializer).map(|raw| $name::new(raw.into_string()))
            }
        }
    };
}

/// Identifiers arrive as JSON strings or integers depending on the publisher
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Text(s) => s,
            WireId::Signed(n) => n.to_string(),
            WireId::Unsigned(n) => n.to_string(),
        }
    }
}

/// Unique identifier of one suspension incident
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SuspensionId(String);

impl_id_type!(SuspensionId);

/// Reference to a metro line owned by the line directory service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MetroLineId(String);

impl_id_type!(MetroLineId);

/// Whether the suspension was planned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspensionType {
    Emergency,
    Scheduled,
}

impl SuspensionType {
    pub fn is_emergency(&self) -> bool {
        matches!(self, SuspensionType::Emergency)
    }
}

impl fmt::Display for SuspensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuspensionType::Emergency => write!(f, "EMERGENCY"),
            SuspensionType::Scheduled => write!(f, "SCHEDULED"),
        }
    }
}

/// A service suspension on one metro line
///
/// Immutable once decoded. A newer message replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suspension {
    pub id: SuspensionId,
    pub metro_line_id: MetroLineId,
    pub title: String,
    pub description: String,
    pub suspension_type: SuspensionType,
    /// When service is expected back; may already be in the past
    #[serde(with = "restore_time")]
    pub expected_restore_time: DateTime<Utc>,
}

impl Suspension {
    /// Whether the expected restore time has already passed at `now`
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.expected_restore_time <= now
    }
}

/// Lifecycle of the broker connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

/// Where an advisory error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Network failure, refused or timed out connection
    Transport,
    /// Broker ERROR frame or rejected handshake
    Protocol,
    /// Payload that is not a valid suspension
    Decode,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Protocol => write!(f, "protocol"),
            ErrorKind::Decode => write!(f, "decode"),
        }
    }
}

/// Human-readable record of the most recent failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
}

impl LastError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }
}

impl fmt::Display for LastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

/// Snapshot read by UI consumers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertState {
    pub suspension: Option<Suspension>,
    pub connection_state: ConnectionState,
    pub last_error: Option<LastError>,
}

impl AlertState {
    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }
}

/// `expectedRestoreTime` accepts RFC 3339 or an offset-less local time read as UTC
mod restore_time {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| {
            de::Error::invalid_value(de::Unexpected::Str(&raw), &"an ISO-8601 timestamp")
        })
    }

    pub(crate) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
}
