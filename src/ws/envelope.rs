//! Wire envelope exchanged over the socket.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope type sent by the heartbeat loop.
pub const PING: &str = "ping";
/// Envelope type the server answers heartbeats with. Never forwarded to handlers.
pub const PONG: &str = "pong";
/// Envelope type used for frames that could not be decoded.
pub const TEXT: &str = "text";
/// Default envelope type for [`ConnectionManager::send_json_message`](super::ConnectionManager::send_json_message).
pub const MESSAGE: &str = "message";

/// A `{type, data, timestamp}` message unit.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Envelope {
    pub fn new<K: Into<String>>(kind: K, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: String) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Wraps a raw frame that failed to decode.
    #[must_use]
    pub fn text(raw: &str) -> Self {
        Self::new(TEXT, Value::String(raw.to_owned())).with_timestamp(now())
    }

    #[must_use]
    pub(crate) fn ping() -> Self {
        Self::new(PING, Value::Null).with_timestamp(now())
    }

    #[must_use]
    pub fn is_pong(&self) -> bool {
        self.kind == PONG
    }

    /// Decodes an inbound frame, falling back to a [`TEXT`] envelope carrying the raw frame.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Self>(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(error = %e, "Frame is not an envelope, delivering as text");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                Self::text(raw)
            }
        }
    }

    /// Fills in the timestamp if the caller left it out.
    pub(crate) fn stamp(&mut self) {
        self.timestamp.get_or_insert_with(now);
    }
}

/// Current time as an ISO-8601 UTC string with millisecond precision.
#[must_use]
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_full_envelope() {
        let envelope =
            Envelope::parse(r#"{"type":"chat","data":{"body":"hi"},"timestamp":"2024-01-01T00:00:00.000Z"}"#);

        assert_eq!(envelope.kind, "chat");
        assert_eq!(envelope.data, json!({"body": "hi"}));
        assert_eq!(envelope.timestamp.as_deref(), Some("2024-01-01T00:00:00.000Z"));
    }

    #[test]
    fn missing_data_and_timestamp_default() {
        let envelope = Envelope::parse(r#"{"type":"pong"}"#);

        assert!(envelope.is_pong(), "pong type should be recognized");
        assert_eq!(envelope.data, Value::Null);
        assert!(envelope.timestamp.is_none(), "timestamp not invented on receive");
    }

    #[test]
    fn malformed_frame_becomes_text() {
        let envelope = Envelope::parse("hello, not json");

        assert_eq!(envelope.kind, TEXT);
        assert_eq!(envelope.data, Value::String("hello, not json".to_owned()));
        assert!(envelope.timestamp.is_some(), "synthetic envelopes are stamped");
    }

    #[test]
    fn json_without_type_becomes_text() {
        let raw = r#"{"data":1}"#;
        let envelope = Envelope::parse(raw);

        assert_eq!(envelope.kind, TEXT);
        assert_eq!(envelope.data, Value::String(raw.to_owned()));
    }

    #[test]
    fn stamp_keeps_existing_timestamp() {
        let mut envelope = Envelope::new("chat", json!("hi")).with_timestamp("earlier".to_owned());
        envelope.stamp();
        assert_eq!(envelope.timestamp.as_deref(), Some("earlier"));

        let mut fresh = Envelope::new("chat", json!("hi"));
        fresh.stamp();
        let stamped = fresh.timestamp.expect("timestamp should be filled in");
        DateTime::parse_from_rfc3339(&stamped).expect("timestamp should be ISO-8601");
        assert!(stamped.ends_with('Z'), "timestamp should be UTC: {stamped}");
    }

    #[test]
    fn serializes_type_field_and_skips_missing_timestamp() {
        let json = serde_json::to_value(Envelope::new("chat", json!("hi"))).unwrap();
        assert_eq!(json, json!({"type": "chat", "data": "hi"}));
    }
}
