//! Webhook event processing: ingestion, the per-event state machine, and
//! the document archival pipeline.
//!
//! ```text
//! ingest(raw_body, signature)
//!   ├─ signing::verify()            // reject before persistence
//!   ├─ payload::extract()           // never fails, degrades to "unknown"
//!   ├─ store.insert_event()         // Pending
//!   └─ tokio::spawn(process_event)  // fire and forget, own error boundary
//!
//! process_event(id)
//!   ├─ store.begin_attempt()        // Processing, attempt_count += 1
//!   ├─ completion event?
//!   │    ├─ no  → Ignored (terminal)
//!   │    └─ yes → resolve envelope (fetch metadata on miss,
//!   │             unique-violation → re-fetch existing row)
//!   │             ├─ documents_fetched? → skip pipeline
//!   │             └─ else: ensure bucket → list → for each document:
//!   │                  download → hash → upload → persist row
//!   │             mark documents_fetched
//!   ├─ success → Completed (or Ignored), last_error cleared
//!   └─ failure → Failed, last_error = "[attempt N] <msg>", propagate
//! ```
//!
//! Retries are never attempted inline; they belong exclusively to the
//! [`RetryScheduler`](crate::webhooks::retry::RetryScheduler) and the manual
//! retry endpoint, both of which reset the event to Pending and re-enter
//! here.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::errors::DbError;
use crate::db::models::envelopes::{DocumentCreate, Envelope};
use crate::db::models::events::{ProcessingState, WebhookEvent, WebhookEventCreate};
use crate::db::store::EventStore;
use crate::provider::{ProviderError, ProviderGateway};
use crate::storage::{ObjectStore, StorageError};
use crate::types::{EnvelopeId, EventId, abbrev_uuid};
use crate::webhooks::{payload, signing};

/// Event type reported by the provider when an envelope finishes signing.
const COMPLETED_EVENT_TYPE: &str = "envelope-completed";
/// Envelope status equivalent to the completed event type.
const COMPLETED_STATUS: &str = "completed";

/// Errors from the ingestion boundary.
#[derive(Error, Debug)]
pub enum IngestError {
    /// A signature was presented and did not verify. Nothing is persisted.
    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Errors from a processing attempt. All variants funnel into the single
/// failure-handling point in [`WebhookProcessor::process_event`].
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Values the processor needs from configuration, injected at construction.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Shared HMAC secret; empty disables verification
    pub hmac_secret: String,
    /// Bucket where documents are archived
    pub default_bucket: String,
}

/// Orchestrates the full lifecycle of webhook events.
///
/// Cheap to clone; clones share the underlying adapters.
#[derive(Clone)]
pub struct WebhookProcessor {
    store: Arc<dyn EventStore>,
    provider: Arc<dyn ProviderGateway>,
    objects: Arc<dyn ObjectStore>,
    config: ProcessorConfig,
}

impl WebhookProcessor {
    pub fn new(
        store: Arc<dyn EventStore>,
        provider: Arc<dyn ProviderGateway>,
        objects: Arc<dyn ObjectStore>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            provider,
            objects,
            config,
        }
    }

    /// Ingest a raw webhook delivery.
    ///
    /// Verifies the signature when one is presented, persists the event in
    /// Pending state, kicks off processing in the background, and returns
    /// the new event's id. The HTTP caller gets its response as soon as the
    /// event is durable.
    pub async fn ingest(&self, raw_body: String, signature: Option<&str>) -> Result<EventId, IngestError> {
        match signature {
            Some(presented) => {
                if self.config.hmac_secret.is_empty() {
                    warn!("HMAC secret not configured - accepting webhook without verification");
                } else if !signing::verify(&raw_body, presented, &self.config.hmac_secret) {
                    warn!("Rejecting webhook with invalid signature");
                    return Err(IngestError::InvalidSignature);
                }
            }
            // Deliveries without a signature header are accepted for
            // compatibility with senders that have signing disabled.
            None => tracing::debug!("Webhook delivery carried no signature header"),
        }

        let extracted = payload::extract(&raw_body);
        let event = self
            .store
            .insert_event(WebhookEventCreate {
                event_type: extracted.event_type,
                envelope_id: extracted.envelope_id,
                status: extracted.status,
                raw_payload: raw_body,
            })
            .await?;

        info!(
            event_id = %abbrev_uuid(&event.id),
            envelope = %event.envelope_id,
            event_type = %event.event_type,
            "Stored webhook event"
        );

        self.spawn_process(event.id);
        Ok(event.id)
    }

    /// Spawn `process_event` as a detached task with its own error boundary.
    /// The failure outcome is persisted by `process_event` itself, so the
    /// spawning caller never needs to await it.
    pub fn spawn_process(&self, id: EventId) {
        let processor = self.clone();
        tokio::spawn(async move {
            if let Err(e) = processor.process_event(id).await {
                tracing::error!(event_id = %abbrev_uuid(&id), error = %e, "Background webhook processing failed");
            }
        });
    }

    /// Run one processing attempt for an event.
    ///
    /// A missing event is a logged no-op. Every call increments the attempt
    /// count exactly once, before any side effect.
    pub async fn process_event(&self, id: EventId) -> Result<(), ProcessingError> {
        let Some(event) = self.store.begin_attempt(id).await? else {
            warn!(event_id = %abbrev_uuid(&id), "Webhook event not found, skipping");
            return Ok(());
        };
        let attempt = event.attempt_count;

        match self.run_workflow(&event).await {
            Ok((state, envelope_record_id)) => {
                self.store.complete_event(id, state, envelope_record_id).await?;
                info!(
                    event_id = %abbrev_uuid(&id),
                    state = %state,
                    attempt,
                    "Processed webhook event"
                );
                Ok(())
            }
            Err(e) => {
                let message = format!("[attempt {attempt}] {e}");
                warn!(event_id = %abbrev_uuid(&id), attempt, error = %e, "Webhook event processing failed");
                self.store.fail_event(id, &message).await?;
                Err(e)
            }
        }
    }

    /// Classify the event and run the fetch workflow for completions.
    async fn run_workflow(&self, event: &WebhookEvent) -> Result<(ProcessingState, Option<EnvelopeId>), ProcessingError> {
        let is_completion = event.event_type == COMPLETED_EVENT_TYPE || event.status == COMPLETED_STATUS;
        if !is_completion {
            info!(
                event_type = %event.event_type,
                envelope = %event.envelope_id,
                "No action needed for event type"
            );
            return Ok((ProcessingState::Ignored, None));
        }

        let envelope = self.resolve_envelope(&event.envelope_id).await?;

        if envelope.documents_fetched {
            info!(envelope = %envelope.external_id, "Documents already archived - skipping");
        } else {
            self.archive_documents(&envelope).await?;
            self.store.mark_documents_fetched(envelope.id).await?;
        }

        Ok((ProcessingState::Completed, Some(envelope.id)))
    }

    /// Look up the envelope by its provider id, creating it from provider
    /// metadata on first sight. Losing the insert race to a concurrent
    /// attempt is not an error; the existing row is re-fetched.
    async fn resolve_envelope(&self, external_id: &str) -> Result<Envelope, ProcessingError> {
        if let Some(envelope) = self.store.find_envelope_by_external_id(external_id).await? {
            return Ok(envelope);
        }

        let metadata = self.provider.get_envelope(external_id).await?;
        match self.store.insert_envelope(metadata).await {
            Ok(envelope) => {
                info!(envelope = %external_id, "Created envelope from provider metadata");
                Ok(envelope)
            }
            Err(e) if e.is_duplicate_envelope() => {
                info!(envelope = %external_id, "Envelope created concurrently, re-fetching");
                self.store
                    .find_envelope_by_external_id(external_id)
                    .await?
                    .ok_or(ProcessingError::Db(DbError::NotFound))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Download, hash, upload, and persist every document of an envelope.
    ///
    /// The first failing document aborts the pipeline; rows and objects
    /// persisted before it stay in place. A full re-run overwrites them by
    /// storage key, so the pipeline is safe to retry as a whole.
    async fn archive_documents(&self, envelope: &Envelope) -> Result<(), ProcessingError> {
        let bucket = &self.config.default_bucket;
        self.objects.ensure_bucket(bucket).await?;

        let listings = self.provider.list_documents(&envelope.external_id).await?;
        let total = listings.len();

        for listing in listings {
            let bytes = self
                .provider
                .download_document(&envelope.external_id, &listing.external_document_id)
                .await?;

            let content_hash = hex::encode(Sha256::digest(&bytes));
            let storage_key = format!("{}/{}_{}", envelope.external_id, listing.external_document_id, listing.name);
            let content_type = mime_guess::from_path(&listing.name).first_or_octet_stream().to_string();
            let size_bytes = bytes.len() as i64;

            self.objects.upload(bucket, &storage_key, bytes, &content_type).await?;

            self.store
                .insert_document(DocumentCreate {
                    envelope_id: envelope.id,
                    external_document_id: listing.external_document_id,
                    name: listing.name,
                    document_type: listing.document_type,
                    file_extension: listing.file_extension,
                    sort_order: listing.sort_order,
                    size_bytes,
                    content_hash,
                    storage_bucket: bucket.clone(),
                    storage_key,
                    uploaded_at: Utc::now(),
                })
                .await?;
        }

        info!(envelope = %envelope.external_id, documents = total, "Archived envelope documents");
        Ok(())
    }
}
