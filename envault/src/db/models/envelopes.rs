//! Database models for envelopes and their archived documents.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{DocumentId, EnvelopeId};

/// Database model for a materialized envelope.
///
/// Created lazily the first time a notification references an unseen
/// provider envelope id. `external_id` is unique; `documents_fetched` is the
/// idempotency guard for the archival pipeline and is set true at most once.
#[derive(Debug, Clone, FromRow)]
pub struct Envelope {
    pub id: EnvelopeId,
    /// Provider-side envelope id
    pub external_id: String,
    pub subject: String,
    pub status: String,
    pub sender_name: String,
    pub sender_email: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
    pub voided_reason: Option<String>,
    pub documents_fetched: bool,
    pub documents_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Envelope metadata as fetched from the provider, before persistence.
#[derive(Debug, Clone)]
pub struct EnvelopeCreate {
    pub external_id: String,
    pub subject: String,
    pub status: String,
    pub sender_name: String,
    pub sender_email: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
    pub voided_reason: Option<String>,
}

/// Database model for a document archived from an envelope.
///
/// `content_hash` is computed over the exact bytes that were uploaded, and
/// `uploaded` is only set after the store confirmed the write.
#[derive(Debug, Clone, FromRow)]
pub struct EnvelopeDocument {
    pub id: DocumentId,
    pub envelope_id: EnvelopeId,
    /// Provider-side document id, unique within its envelope
    pub external_document_id: String,
    pub name: String,
    pub document_type: String,
    pub file_extension: String,
    pub sort_order: i32,
    pub size_bytes: Option<i64>,
    /// SHA-256 hex digest of the uploaded bytes
    pub content_hash: Option<String>,
    pub storage_bucket: Option<String>,
    pub storage_key: Option<String>,
    pub uploaded: bool,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fully processed document row, ready for persistence.
#[derive(Debug, Clone)]
pub struct DocumentCreate {
    pub envelope_id: EnvelopeId,
    pub external_document_id: String,
    pub name: String,
    pub document_type: String,
    pub file_extension: String,
    pub sort_order: i32,
    pub size_bytes: i64,
    pub content_hash: String,
    pub storage_bucket: String,
    pub storage_key: String,
    pub uploaded_at: DateTime<Utc>,
}
