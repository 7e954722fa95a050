use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of the synthetic event every new stream starts with.
pub const INFO_EVENT: &str = "info";
/// Payload of the synthetic first event.
pub const CONNECTED_MESSAGE: &str = "Connected";

/// One domain change notification.
///
/// Wire: `{ "type": "products_updated", "data": {} }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "data")]
    payload: Value,
}

impl Event {
    /// Build an event from any serializable payload. A payload that cannot
    /// be represented as JSON becomes `null`.
    pub fn new(kind: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            kind: kind.into(),
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
        }
    }

    /// The `info` / `"Connected"` event sent first on every stream.
    pub fn connected() -> Self {
        Self::new(INFO_EVENT, CONNECTED_MESSAGE)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Text for an SSE `data:` field. Strings go out verbatim, everything
    /// else as compact JSON.
    pub fn data_text(&self) -> String {
        match &self.payload {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Domain changes announced by the inventory handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainEvent {
    SamplesUpdated,
    ProductsUpdated,
    LocationsUpdated,
    UsersUpdated,
}

impl DomainEvent {
    pub fn kind(self) -> &'static str {
        match self {
            DomainEvent::SamplesUpdated => "samples_updated",
            DomainEvent::ProductsUpdated => "products_updated",
            DomainEvent::LocationsUpdated => "locations_updated",
            DomainEvent::UsersUpdated => "users_updated",
        }
    }
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connected_event_shape() {
        let ev = Event::connected();
        assert_eq!(ev.kind(), "info");
        assert_eq!(ev.payload(), &json!("Connected"));
        assert_eq!(ev.data_text(), "Connected");
    }

    #[test]
    fn object_payload_renders_as_json() {
        let ev = Event::new("products_updated", json!({}));
        assert_eq!(ev.data_text(), "{}");

        let ev = Event::new("samples_updated", json!({ "id": "abc", "count": 2 }));
        let text = ev.data_text();
        assert!(text.contains(r#""id":"abc""#));
        assert!(text.contains(r#""count":2"#));
    }

    #[test]
    fn serializes_with_type_and_data_keys() {
        let ev = Event::new("users_updated", json!({}));
        let wire = serde_json::to_string(&ev).unwrap();
        assert_eq!(wire, r#"{"type":"users_updated","data":{}}"#);
    }

    #[test]
    fn domain_event_kinds() {
        assert_eq!(DomainEvent::SamplesUpdated.kind(), "samples_updated");
        assert_eq!(DomainEvent::LocationsUpdated.to_string(), "locations_updated");
    }
}
