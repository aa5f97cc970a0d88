//! In-memory adapter for the [`EventStore`] trait.
//!
//! Used by the test suite and handy for local development without a
//! database. Mirrors the Postgres adapter's behavior, including the unique
//! constraint on envelope `external_id`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::errors::{DbError, Result};
use crate::db::models::envelopes::{DocumentCreate, Envelope, EnvelopeCreate, EnvelopeDocument};
use crate::db::models::events::{ProcessingState, WebhookEvent, WebhookEventCreate};
use crate::db::store::EventStore;
use crate::types::{DocumentId, EnvelopeId, EventId};

#[derive(Default)]
struct Inner {
    events: HashMap<EventId, WebhookEvent>,
    envelopes: HashMap<EnvelopeId, Envelope>,
    documents: HashMap<DocumentId, EnvelopeDocument>,
}

#[derive(Default)]
pub struct InMemoryEventStore {
    inner: Mutex<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backdate an event's `last_attempt_at`, for exercising backoff windows
    /// in tests.
    pub fn set_last_attempt_at(&self, id: EventId, at: DateTime<Utc>) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if let Some(event) = inner.events.get_mut(&id) {
            event.last_attempt_at = Some(at);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store lock poisoned")
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn insert_event(&self, create: WebhookEventCreate) -> Result<WebhookEvent> {
        let now = Utc::now();
        let event = WebhookEvent {
            id: Uuid::new_v4(),
            event_type: create.event_type,
            envelope_id: create.envelope_id,
            status: create.status,
            raw_payload: create.raw_payload,
            processing_state: ProcessingState::Pending.as_str().to_string(),
            attempt_count: 0,
            last_error: None,
            last_attempt_at: None,
            envelope_record_id: None,
            created_at: now,
            updated_at: now,
        };
        self.lock().events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: EventId) -> Result<Option<WebhookEvent>> {
        Ok(self.lock().events.get(&id).cloned())
    }

    async fn begin_attempt(&self, id: EventId) -> Result<Option<WebhookEvent>> {
        let mut inner = self.lock();
        let Some(event) = inner.events.get_mut(&id) else {
            return Ok(None);
        };
        event.processing_state = ProcessingState::Processing.as_str().to_string();
        event.attempt_count += 1;
        event.updated_at = Utc::now();
        Ok(Some(event.clone()))
    }

    async fn complete_event(&self, id: EventId, state: ProcessingState, envelope_record_id: Option<EnvelopeId>) -> Result<()> {
        let mut inner = self.lock();
        if let Some(event) = inner.events.get_mut(&id) {
            event.processing_state = state.as_str().to_string();
            event.last_error = None;
            event.last_attempt_at = Some(Utc::now());
            if envelope_record_id.is_some() {
                event.envelope_record_id = envelope_record_id;
            }
            event.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn fail_event(&self, id: EventId, error: &str) -> Result<()> {
        let mut inner = self.lock();
        if let Some(event) = inner.events.get_mut(&id) {
            event.processing_state = ProcessingState::Failed.as_str().to_string();
            event.last_error = Some(error.to_string());
            event.last_attempt_at = Some(Utc::now());
            event.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn reset_for_retry(&self, id: EventId) -> Result<()> {
        let mut inner = self.lock();
        if let Some(event) = inner.events.get_mut(&id) {
            event.processing_state = ProcessingState::Pending.as_str().to_string();
            event.last_error = None;
            event.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn failed_events(&self, max_attempts: i32, limit: i64) -> Result<Vec<WebhookEvent>> {
        let inner = self.lock();
        let mut failed: Vec<WebhookEvent> = inner
            .events
            .values()
            .filter(|e| e.state() == ProcessingState::Failed && e.attempt_count < max_attempts && e.last_attempt_at.is_some())
            .cloned()
            .collect();
        failed.sort_by_key(|e| e.last_attempt_at);
        failed.truncate(limit as usize);
        Ok(failed)
    }

    async fn find_envelope_by_external_id(&self, external_id: &str) -> Result<Option<Envelope>> {
        Ok(self.lock().envelopes.values().find(|e| e.external_id == external_id).cloned())
    }

    async fn insert_envelope(&self, create: EnvelopeCreate) -> Result<Envelope> {
        let mut inner = self.lock();
        if inner.envelopes.values().any(|e| e.external_id == create.external_id) {
            return Err(DbError::UniqueViolation {
                constraint: Some("envelopes_external_id_unique".to_string()),
                table: Some("envelopes".to_string()),
                message: format!("duplicate external_id: {}", create.external_id),
            });
        }
        let now = Utc::now();
        let envelope = Envelope {
            id: Uuid::new_v4(),
            external_id: create.external_id,
            subject: create.subject,
            status: create.status,
            sender_name: create.sender_name,
            sender_email: create.sender_email,
            sent_at: create.sent_at,
            completed_at: create.completed_at,
            voided_at: create.voided_at,
            voided_reason: create.voided_reason,
            documents_fetched: false,
            documents_fetched_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.envelopes.insert(envelope.id, envelope.clone());
        Ok(envelope)
    }

    async fn mark_documents_fetched(&self, id: EnvelopeId) -> Result<()> {
        let mut inner = self.lock();
        if let Some(envelope) = inner.envelopes.get_mut(&id) {
            envelope.documents_fetched = true;
            envelope.documents_fetched_at = Some(Utc::now());
            envelope.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_envelope(&self, id: EnvelopeId) -> Result<Option<Envelope>> {
        Ok(self.lock().envelopes.get(&id).cloned())
    }

    async fn list_envelopes(&self, limit: i64, offset: i64) -> Result<Vec<Envelope>> {
        let inner = self.lock();
        let mut envelopes: Vec<Envelope> = inner.envelopes.values().cloned().collect();
        envelopes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(envelopes.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn insert_document(&self, create: DocumentCreate) -> Result<EnvelopeDocument> {
        let mut inner = self.lock();
        // Upsert on (envelope_id, external_document_id), as a re-run of the
        // archival pipeline re-persists documents it already saw.
        let existing_id = inner
            .documents
            .values()
            .find(|d| d.envelope_id == create.envelope_id && d.external_document_id == create.external_document_id)
            .map(|d| d.id);
        let document = EnvelopeDocument {
            id: existing_id.unwrap_or_else(Uuid::new_v4),
            envelope_id: create.envelope_id,
            external_document_id: create.external_document_id,
            name: create.name,
            document_type: create.document_type,
            file_extension: create.file_extension,
            sort_order: create.sort_order,
            size_bytes: Some(create.size_bytes),
            content_hash: Some(create.content_hash),
            storage_bucket: Some(create.storage_bucket),
            storage_key: Some(create.storage_key),
            uploaded: true,
            uploaded_at: Some(create.uploaded_at),
            created_at: Utc::now(),
        };
        inner.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn documents_for_envelope(&self, envelope_id: EnvelopeId) -> Result<Vec<EnvelopeDocument>> {
        let inner = self.lock();
        let mut documents: Vec<EnvelopeDocument> = inner.documents.values().filter(|d| d.envelope_id == envelope_id).cloned().collect();
        documents.sort_by_key(|d| d.sort_order);
        Ok(documents)
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<EnvelopeDocument>> {
        Ok(self.lock().documents.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_create() -> WebhookEventCreate {
        WebhookEventCreate {
            event_type: "envelope-completed".to_string(),
            envelope_id: "env-1".to_string(),
            status: "completed".to_string(),
            raw_payload: "{}".to_string(),
        }
    }

    fn envelope_create(external_id: &str) -> EnvelopeCreate {
        EnvelopeCreate {
            external_id: external_id.to_string(),
            subject: "Contract".to_string(),
            status: "completed".to_string(),
            sender_name: "Ada".to_string(),
            sender_email: "ada@example.com".to_string(),
            sent_at: None,
            completed_at: None,
            voided_at: None,
            voided_reason: None,
        }
    }

    #[tokio::test]
    async fn event_lifecycle() {
        let store = InMemoryEventStore::new();
        let event = store.insert_event(event_create()).await.unwrap();
        assert_eq!(event.state(), ProcessingState::Pending);
        assert_eq!(event.attempt_count, 0);

        let in_flight = store.begin_attempt(event.id).await.unwrap().unwrap();
        assert_eq!(in_flight.state(), ProcessingState::Processing);
        assert_eq!(in_flight.attempt_count, 1);

        store.fail_event(event.id, "[attempt 1] boom").await.unwrap();
        let failed = store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(failed.state(), ProcessingState::Failed);
        assert_eq!(failed.last_error.as_deref(), Some("[attempt 1] boom"));
        assert!(failed.last_attempt_at.is_some());

        store.reset_for_retry(event.id).await.unwrap();
        let pending = store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(pending.state(), ProcessingState::Pending);
        assert_eq!(pending.last_error, None);
        // Attempt count survives the reset
        assert_eq!(pending.attempt_count, 1);

        store.complete_event(event.id, ProcessingState::Completed, None).await.unwrap();
        let completed = store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(completed.state(), ProcessingState::Completed);
        assert_eq!(completed.last_error, None);
    }

    #[tokio::test]
    async fn begin_attempt_on_missing_event_is_none() {
        let store = InMemoryEventStore::new();
        assert!(store.begin_attempt(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_external_id_is_rejected() {
        let store = InMemoryEventStore::new();
        store.insert_envelope(envelope_create("env-dup")).await.unwrap();

        let err = store.insert_envelope(envelope_create("env-dup")).await.unwrap_err();
        assert!(err.is_duplicate_envelope());

        let found = store.find_envelope_by_external_id("env-dup").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn document_insert_upserts_by_external_id() {
        let store = InMemoryEventStore::new();
        let envelope = store.insert_envelope(envelope_create("env-1")).await.unwrap();

        let create = DocumentCreate {
            envelope_id: envelope.id,
            external_document_id: "1".to_string(),
            name: "contract.pdf".to_string(),
            document_type: "content".to_string(),
            file_extension: "pdf".to_string(),
            sort_order: 1,
            size_bytes: 10,
            content_hash: "aaaa".to_string(),
            storage_bucket: "docs".to_string(),
            storage_key: "env-1/1_contract.pdf".to_string(),
            uploaded_at: Utc::now(),
        };
        let first = store.insert_document(create.clone()).await.unwrap();

        let second = store
            .insert_document(DocumentCreate {
                content_hash: "bbbb".to_string(),
                ..create
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let documents = store.documents_for_envelope(envelope.id).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].content_hash.as_deref(), Some("bbbb"));
    }

    #[tokio::test]
    async fn failed_events_respects_attempt_cap_and_order() {
        let store = InMemoryEventStore::new();

        let first = store.insert_event(event_create()).await.unwrap();
        let second = store.insert_event(event_create()).await.unwrap();
        let exhausted = store.insert_event(event_create()).await.unwrap();

        for id in [first.id, second.id] {
            store.begin_attempt(id).await.unwrap();
            store.fail_event(id, "[attempt 1] boom").await.unwrap();
        }
        for _ in 0..5 {
            store.begin_attempt(exhausted.id).await.unwrap();
            store.fail_event(exhausted.id, "boom").await.unwrap();
        }

        // Backdate `first` so it sorts before `second`
        store.set_last_attempt_at(first.id, Utc::now() - chrono::Duration::minutes(30));

        let eligible = store.failed_events(5, 10).await.unwrap();
        assert_eq!(eligible.len(), 2);
        assert_eq!(eligible[0].id, first.id);
        assert_eq!(eligible[1].id, second.id);
    }
}
