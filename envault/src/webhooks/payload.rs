//! Tolerant extraction of the (event type, envelope id, status) triple from
//! raw webhook payloads.
//!
//! Two payload shapes are seen in the wild:
//!
//! ```json
//! {"event": "...", "data": {"envelopeId": "...", "envelopeSummary": {"status": "..."}}}
//! {"envelopeId": "...", "status": "..."}
//! ```
//!
//! Top-level `envelopeId`/`status` fields override the nested ones when both
//! are present. Extraction never fails: anything missing or unparsable
//! degrades to the literal `"unknown"`, so the raw payload is always
//! persisted for later replay.

use serde_json::Value;

pub const UNKNOWN: &str = "unknown";

/// Structured fields extracted from a raw webhook body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPayload {
    pub event_type: String,
    pub envelope_id: String,
    pub status: String,
}

impl Default for ExtractedPayload {
    fn default() -> Self {
        Self {
            event_type: UNKNOWN.to_string(),
            envelope_id: UNKNOWN.to_string(),
            status: UNKNOWN.to_string(),
        }
    }
}

/// Extract the notification triple from a raw body.
pub fn extract(raw: &str) -> ExtractedPayload {
    let mut extracted = ExtractedPayload::default();

    let Ok(payload) = serde_json::from_str::<Value>(raw) else {
        return extracted;
    };

    if let Some(event) = payload.get("event").and_then(Value::as_str) {
        extracted.event_type = event.to_string();
    }

    // Nested shape: data.envelopeId, data.envelopeSummary.status
    if let Some(data) = payload.get("data") {
        if let Some(envelope_id) = data.get("envelopeId").and_then(Value::as_str) {
            extracted.envelope_id = envelope_id.to_string();
        }
        if let Some(status) = data
            .get("envelopeSummary")
            .and_then(|summary| summary.get("status"))
            .and_then(Value::as_str)
        {
            extracted.status = status.to_string();
        }
    }

    // Flat shape, takes precedence over the nested fields
    if let Some(envelope_id) = payload.get("envelopeId").and_then(Value::as_str) {
        extracted.envelope_id = envelope_id.to_string();
    }
    if let Some(status) = payload.get("status").and_then(Value::as_str) {
        extracted.status = status.to_string();
    }

    extracted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_shape() {
        let raw = r#"{
            "event": "envelope-completed",
            "data": {
                "envelopeId": "env123",
                "envelopeSummary": {"status": "completed"}
            }
        }"#;
        let extracted = extract(raw);
        assert_eq!(extracted.event_type, "envelope-completed");
        assert_eq!(extracted.envelope_id, "env123");
        assert_eq!(extracted.status, "completed");
    }

    #[test]
    fn flat_shape() {
        let raw = r#"{"event": "recipient-sent", "envelopeId": "env456", "status": "sent"}"#;
        let extracted = extract(raw);
        assert_eq!(extracted.event_type, "recipient-sent");
        assert_eq!(extracted.envelope_id, "env456");
        assert_eq!(extracted.status, "sent");
    }

    #[test]
    fn flat_fields_override_nested() {
        let raw = r#"{
            "event": "envelope-completed",
            "envelopeId": "top-level",
            "status": "voided",
            "data": {
                "envelopeId": "nested",
                "envelopeSummary": {"status": "completed"}
            }
        }"#;
        let extracted = extract(raw);
        assert_eq!(extracted.envelope_id, "top-level");
        assert_eq!(extracted.status, "voided");
    }

    #[test]
    fn garbage_degrades_to_unknown() {
        let extracted = extract("this is not json");
        assert_eq!(extracted, ExtractedPayload::default());
        assert_eq!(extracted.event_type, UNKNOWN);
    }

    #[test]
    fn partial_payload_keeps_unknown_defaults() {
        let extracted = extract(r#"{"event": "envelope-sent"}"#);
        assert_eq!(extracted.event_type, "envelope-sent");
        assert_eq!(extracted.envelope_id, UNKNOWN);
        assert_eq!(extracted.status, UNKNOWN);
    }

    #[test]
    fn non_string_fields_are_ignored() {
        let extracted = extract(r#"{"event": 42, "envelopeId": {"x": 1}, "status": null}"#);
        assert_eq!(extracted, ExtractedPayload::default());
    }
}
