//! Database models for inbound webhook events and their processing lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::{EnvelopeId, EventId};

/// Processing lifecycle of a webhook event.
///
/// `Pending → Processing → {Completed | Failed | Ignored}`. Completed and
/// Ignored are terminal. Failed events re-enter via the retry scheduler or a
/// manual retry, which resets them to Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    /// Persisted, processing not yet started
    Pending,
    /// An attempt is in flight
    Processing,
    /// Fully processed
    Completed,
    /// Last attempt failed; eligible for retry until attempts are exhausted
    Failed,
    /// Event type requires no action
    Ignored,
}

impl ProcessingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Ignored => "ignored",
        }
    }

    /// Terminal states never re-enter processing automatically.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Ignored)
    }
}

impl std::str::FromStr for ProcessingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "ignored" => Ok(Self::Ignored),
            _ => Err(format!("Unknown processing state: {}", s)),
        }
    }
}

impl std::fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database model for a received webhook event.
///
/// The raw payload is preserved verbatim for audit and replay, even when the
/// structured fields could not be extracted.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookEvent {
    pub id: EventId,
    /// Provider event classification, e.g. "envelope-completed"
    pub event_type: String,
    /// Provider envelope id the event concerns; "unknown" if unparsable
    pub envelope_id: String,
    /// Envelope status reported by the provider
    pub status: String,
    pub raw_payload: String,
    /// Stored as TEXT; see [`ProcessingState`]
    pub processing_state: String,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Link to the materialized envelope row, once one exists
    pub envelope_record_id: Option<EnvelopeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Get the parsed processing state.
    pub fn state(&self) -> ProcessingState {
        self.processing_state.parse().unwrap_or(ProcessingState::Pending)
    }
}

/// Request to persist a newly received webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEventCreate {
    pub event_type: String,
    pub envelope_id: String,
    pub status: String,
    pub raw_payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips() {
        for state in [
            ProcessingState::Pending,
            ProcessingState::Processing,
            ProcessingState::Completed,
            ProcessingState::Failed,
            ProcessingState::Ignored,
        ] {
            assert_eq!(state.as_str().parse::<ProcessingState>().unwrap(), state);
        }
        assert!("garbage".parse::<ProcessingState>().is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(ProcessingState::Completed.is_terminal());
        assert!(ProcessingState::Ignored.is_terminal());
        assert!(!ProcessingState::Failed.is_terminal());
        assert!(!ProcessingState::Pending.is_terminal());
        assert!(!ProcessingState::Processing.is_terminal());
    }
}
