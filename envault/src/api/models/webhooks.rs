//! API response models for webhook event endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::events::{ProcessingState, WebhookEvent};
use crate::types::{EnvelopeId, EventId};

/// Response for a stored webhook event. The raw payload is included for
/// audit; it is already persisted verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookEventResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: EventId,
    pub event_type: String,
    pub envelope_id: String,
    pub status: String,
    pub raw_payload: String,
    pub processing_state: ProcessingState,
    pub attempt_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub envelope_record_id: Option<EnvelopeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WebhookEvent> for WebhookEventResponse {
    fn from(event: WebhookEvent) -> Self {
        let processing_state = event.state();
        Self {
            id: event.id,
            event_type: event.event_type,
            envelope_id: event.envelope_id,
            status: event.status,
            raw_payload: event.raw_payload,
            processing_state,
            attempt_count: event.attempt_count,
            last_error: event.last_error,
            last_attempt_at: event.last_attempt_at,
            envelope_record_id: event.envelope_record_id,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

/// Acknowledgement returned to the webhook sender.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    pub message: String,
    #[schema(value_type = String, format = "uuid")]
    pub event_id: EventId,
}

/// Acknowledgement for a manual retry request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RetryResponse {
    pub message: String,
    #[schema(value_type = String, format = "uuid")]
    pub event_id: EventId,
}

/// Liveness probe response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
