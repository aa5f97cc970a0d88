//! Capability trait for the durable event/envelope store.
//!
//! The processing core and the API handlers depend only on this trait.
//! Production uses [`PgEventStore`](super::postgres::PgEventStore); tests and
//! local development can use
//! [`InMemoryEventStore`](super::memory::InMemoryEventStore).

use async_trait::async_trait;

use crate::db::errors::Result;
use crate::db::models::envelopes::{DocumentCreate, Envelope, EnvelopeCreate, EnvelopeDocument};
use crate::db::models::events::{ProcessingState, WebhookEvent, WebhookEventCreate};
use crate::types::{DocumentId, EnvelopeId, EventId};

#[async_trait]
pub trait EventStore: Send + Sync {
    // ===== Webhook events =====

    /// Persist a newly received event in the Pending state.
    async fn insert_event(&self, create: WebhookEventCreate) -> Result<WebhookEvent>;

    /// Get an event by id.
    async fn get_event(&self, id: EventId) -> Result<Option<WebhookEvent>>;

    /// Atomically move an event to Processing and increment its attempt
    /// count. Returns the updated row, or `None` if the event no longer
    /// exists. This runs before any side effect so a crash mid-attempt is
    /// observable as an in-flight attempt.
    async fn begin_attempt(&self, id: EventId) -> Result<Option<WebhookEvent>>;

    /// Finish an attempt successfully: set the terminal state (Completed or
    /// Ignored), clear `last_error`, stamp `last_attempt_at`, and link the
    /// envelope row if one was resolved.
    async fn complete_event(&self, id: EventId, state: ProcessingState, envelope_record_id: Option<EnvelopeId>) -> Result<()>;

    /// Finish an attempt in failure: set Failed, record the diagnostic
    /// message, stamp `last_attempt_at`.
    async fn fail_event(&self, id: EventId, error: &str) -> Result<()>;

    /// Reset a failed event to Pending and clear its error, ahead of a
    /// retry re-entry. Attempt count is never reset.
    async fn reset_for_retry(&self, id: EventId) -> Result<()>;

    /// Failed events still eligible for automatic retry: fewer than
    /// `max_attempts` attempts and at least one prior attempt recorded.
    /// Ordered oldest `last_attempt_at` first, limited to `limit` rows.
    async fn failed_events(&self, max_attempts: i32, limit: i64) -> Result<Vec<WebhookEvent>>;

    // ===== Envelopes =====

    async fn find_envelope_by_external_id(&self, external_id: &str) -> Result<Option<Envelope>>;

    /// Insert a new envelope. A unique violation on `external_id` means a
    /// concurrent attempt won the race; callers should re-fetch.
    async fn insert_envelope(&self, create: EnvelopeCreate) -> Result<Envelope>;

    /// Flip the `documents_fetched` idempotency guard. Never unset by the
    /// core.
    async fn mark_documents_fetched(&self, id: EnvelopeId) -> Result<()>;

    async fn get_envelope(&self, id: EnvelopeId) -> Result<Option<Envelope>>;

    /// Newest-first page of envelopes.
    async fn list_envelopes(&self, limit: i64, offset: i64) -> Result<Vec<Envelope>>;

    // ===== Documents =====

    /// Upsert by `(envelope_id, external_document_id)`: a re-run of the
    /// archival pipeline overwrites the rows it already wrote.
    async fn insert_document(&self, create: DocumentCreate) -> Result<EnvelopeDocument>;

    /// Documents for an envelope, ordered by `sort_order`.
    async fn documents_for_envelope(&self, envelope_id: EnvelopeId) -> Result<Vec<EnvelopeDocument>>;

    async fn get_document(&self, id: DocumentId) -> Result<Option<EnvelopeDocument>>;
}
