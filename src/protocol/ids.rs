//! Session identifiers and wire timestamps

use super::DecodeError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Compound session identifier of the form `<providerKind>:<id>`
///
/// The provider kind is everything before the first `:`; the id may itself
/// contain colons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId {
    provider_kind: String,
    id: String,
}

impl SessionId {
    pub fn new(provider_kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider_kind: provider_kind.into(),
            id: id.into(),
        }
    }

    pub fn provider_kind(&self) -> &str {
        &self.provider_kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl FromStr for SessionId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((kind, id)) if !kind.is_empty() && !id.is_empty() => Ok(Self::new(kind, id)),
            _ => Err(DecodeError::InvalidSessionId(s.to_string())),
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider_kind, self.id)
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Parse a wire timestamp.
///
/// Accepts integer (or fractional) milliseconds since the Unix epoch, or an
/// RFC 3339 string. Both normalise to UTC.
pub fn parse_timestamp(field: &'static str, value: &Value) -> Result<DateTime<Utc>, DecodeError> {
    let invalid = || DecodeError::InvalidTimestamp {
        field,
        value: value.to_string(),
    };

    match value {
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().and_then(whole_millis))
                .ok_or_else(invalid)?;
            Utc.timestamp_millis_opt(millis).single().ok_or_else(invalid)
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

// Sub-millisecond precision is dropped
#[allow(clippy::cast_possible_truncation)]
fn whole_millis(ms: f64) -> Option<i64> {
    ms.is_finite().then(|| ms.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_id_splits_on_first_colon() {
        let id: SessionId = "claude:abc:def".parse().unwrap();
        assert_eq!(id.provider_kind(), "claude");
        assert_eq!(id.id(), "abc:def");
        assert_eq!(id.to_string(), "claude:abc:def");
    }

    #[test]
    fn session_id_rejects_missing_parts() {
        for raw in ["", "claude", ":abc", "claude:"] {
            assert!(
                matches!(raw.parse::<SessionId>(), Err(DecodeError::InvalidSessionId(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn session_id_serializes_as_string() {
        let id = SessionId::new("codex", "s-1");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("codex:s-1"));
        let back: SessionId = serde_json::from_value(json!("codex:s-1")).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_value::<SessionId>(json!("nocolon")).is_err());
    }

    #[test]
    fn timestamps_accept_millis_and_rfc3339() {
        let from_millis = parse_timestamp("emittedAt", &json!(1_700_000_000_000_i64)).unwrap();
        let from_string = parse_timestamp("emittedAt", &json!("2023-11-14T22:13:20Z")).unwrap();
        assert_eq!(from_millis, from_string);

        let offset = parse_timestamp("emittedAt", &json!("2023-11-14T23:13:20+01:00")).unwrap();
        assert_eq!(offset, from_string);
    }

    #[test]
    fn timestamps_reject_other_shapes() {
        for value in [json!(true), json!("yesterday"), json!({"ms": 1}), Value::Null] {
            assert!(matches!(
                parse_timestamp("sourceTimestamp", &value),
                Err(DecodeError::InvalidTimestamp {
                    field: "sourceTimestamp",
                    ..
                })
            ));
        }
    }
}
