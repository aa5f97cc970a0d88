//! PostgreSQL adapter for the [`EventStore`] trait.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::db::errors::Result;
use crate::db::models::envelopes::{DocumentCreate, Envelope, EnvelopeCreate, EnvelopeDocument};
use crate::db::models::events::{ProcessingState, WebhookEvent, WebhookEventCreate};
use crate::db::store::EventStore;
use crate::types::{DocumentId, EnvelopeId, EventId, abbrev_uuid};

/// Event store backed by PostgreSQL.
///
/// Every method is a single statement, so each mutation is atomic on its
/// own. The fetch pipeline is deliberately not wrapped in a cross-row
/// transaction: partially archived documents are tolerated and re-running
/// the pipeline overwrites them by storage key.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    #[instrument(skip(self, create), fields(envelope = %create.envelope_id), err)]
    async fn insert_event(&self, create: WebhookEventCreate) -> Result<WebhookEvent> {
        let event = sqlx::query_as::<_, WebhookEvent>(
            r#"
            INSERT INTO webhook_events (event_type, envelope_id, status, raw_payload, processing_state)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING *
            "#,
        )
        .bind(&create.event_type)
        .bind(&create.envelope_id)
        .bind(&create.status)
        .bind(&create.raw_payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    #[instrument(skip(self), fields(event_id = %abbrev_uuid(&id)), err)]
    async fn get_event(&self, id: EventId) -> Result<Option<WebhookEvent>> {
        let event = sqlx::query_as::<_, WebhookEvent>("SELECT * FROM webhook_events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    #[instrument(skip(self), fields(event_id = %abbrev_uuid(&id)), err)]
    async fn begin_attempt(&self, id: EventId) -> Result<Option<WebhookEvent>> {
        let event = sqlx::query_as::<_, WebhookEvent>(
            r#"
            UPDATE webhook_events
            SET processing_state = 'processing',
                attempt_count = attempt_count + 1,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    #[instrument(skip(self), fields(event_id = %abbrev_uuid(&id), state = %state), err)]
    async fn complete_event(&self, id: EventId, state: ProcessingState, envelope_record_id: Option<EnvelopeId>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET processing_state = $2,
                last_error = NULL,
                last_attempt_at = now(),
                envelope_record_id = COALESCE($3, envelope_record_id),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(state.as_str())
        .bind(envelope_record_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, error), fields(event_id = %abbrev_uuid(&id)), err)]
    async fn fail_event(&self, id: EventId, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET processing_state = 'failed',
                last_error = $2,
                last_attempt_at = now(),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(event_id = %abbrev_uuid(&id)), err)]
    async fn reset_for_retry(&self, id: EventId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET processing_state = 'pending',
                last_error = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn failed_events(&self, max_attempts: i32, limit: i64) -> Result<Vec<WebhookEvent>> {
        let events = sqlx::query_as::<_, WebhookEvent>(
            r#"
            SELECT * FROM webhook_events
            WHERE processing_state = 'failed'
              AND attempt_count < $1
              AND last_attempt_at IS NOT NULL
            ORDER BY last_attempt_at ASC
            LIMIT $2
            "#,
        )
        .bind(max_attempts)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    #[instrument(skip(self), err)]
    async fn find_envelope_by_external_id(&self, external_id: &str) -> Result<Option<Envelope>> {
        let envelope = sqlx::query_as::<_, Envelope>("SELECT * FROM envelopes WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(envelope)
    }

    #[instrument(skip(self, create), fields(external_id = %create.external_id), err)]
    async fn insert_envelope(&self, create: EnvelopeCreate) -> Result<Envelope> {
        let envelope = sqlx::query_as::<_, Envelope>(
            r#"
            INSERT INTO envelopes (
                external_id, subject, status, sender_name, sender_email,
                sent_at, completed_at, voided_at, voided_reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&create.external_id)
        .bind(&create.subject)
        .bind(&create.status)
        .bind(&create.sender_name)
        .bind(&create.sender_email)
        .bind(create.sent_at)
        .bind(create.completed_at)
        .bind(create.voided_at)
        .bind(&create.voided_reason)
        .fetch_one(&self.pool)
        .await?;

        Ok(envelope)
    }

    #[instrument(skip(self), fields(envelope_id = %abbrev_uuid(&id)), err)]
    async fn mark_documents_fetched(&self, id: EnvelopeId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE envelopes
            SET documents_fetched = true,
                documents_fetched_at = now(),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(envelope_id = %abbrev_uuid(&id)), err)]
    async fn get_envelope(&self, id: EnvelopeId) -> Result<Option<Envelope>> {
        let envelope = sqlx::query_as::<_, Envelope>("SELECT * FROM envelopes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(envelope)
    }

    #[instrument(skip(self), err)]
    async fn list_envelopes(&self, limit: i64, offset: i64) -> Result<Vec<Envelope>> {
        let envelopes = sqlx::query_as::<_, Envelope>(
            r#"
            SELECT * FROM envelopes
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(envelopes)
    }

    #[instrument(skip(self, create), fields(envelope_id = %abbrev_uuid(&create.envelope_id)), err)]
    async fn insert_document(&self, create: DocumentCreate) -> Result<EnvelopeDocument> {
        let document = sqlx::query_as::<_, EnvelopeDocument>(
            r#"
            INSERT INTO envelope_documents (
                envelope_id, external_document_id, name, document_type, file_extension,
                sort_order, size_bytes, content_hash, storage_bucket, storage_key,
                uploaded, uploaded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, true, $11)
            ON CONFLICT (envelope_id, external_document_id) DO UPDATE
            SET name = EXCLUDED.name,
                document_type = EXCLUDED.document_type,
                file_extension = EXCLUDED.file_extension,
                sort_order = EXCLUDED.sort_order,
                size_bytes = EXCLUDED.size_bytes,
                content_hash = EXCLUDED.content_hash,
                storage_bucket = EXCLUDED.storage_bucket,
                storage_key = EXCLUDED.storage_key,
                uploaded = true,
                uploaded_at = EXCLUDED.uploaded_at
            RETURNING *
            "#,
        )
        .bind(create.envelope_id)
        .bind(&create.external_document_id)
        .bind(&create.name)
        .bind(&create.document_type)
        .bind(&create.file_extension)
        .bind(create.sort_order)
        .bind(create.size_bytes)
        .bind(&create.content_hash)
        .bind(&create.storage_bucket)
        .bind(&create.storage_key)
        .bind(create.uploaded_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(document)
    }

    #[instrument(skip(self), fields(envelope_id = %abbrev_uuid(&envelope_id)), err)]
    async fn documents_for_envelope(&self, envelope_id: EnvelopeId) -> Result<Vec<EnvelopeDocument>> {
        let documents = sqlx::query_as::<_, EnvelopeDocument>(
            r#"
            SELECT * FROM envelope_documents
            WHERE envelope_id = $1
            ORDER BY sort_order ASC
            "#,
        )
        .bind(envelope_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(documents)
    }

    #[instrument(skip(self), fields(document_id = %abbrev_uuid(&id)), err)]
    async fn get_document(&self, id: DocumentId) -> Result<Option<EnvelopeDocument>> {
        let document = sqlx::query_as::<_, EnvelopeDocument>("SELECT * FROM envelope_documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(document)
    }
}
