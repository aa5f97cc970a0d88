//! API response models for envelope and document endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::models::envelopes::{Envelope, EnvelopeDocument};
use crate::types::{DocumentId, EnvelopeId};

fn default_limit() -> i64 {
    50
}

/// Pagination for list endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListQuery {
    /// Maximum rows to return (default 50)
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Rows to skip (default 0)
    #[serde(default)]
    pub offset: i64,
}

/// Response for an archived document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DocumentId,
    #[schema(value_type = String, format = "uuid")]
    pub envelope_id: EnvelopeId,
    pub external_document_id: String,
    pub name: String,
    pub document_type: String,
    pub file_extension: String,
    pub sort_order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub uploaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<EnvelopeDocument> for DocumentResponse {
    fn from(document: EnvelopeDocument) -> Self {
        Self {
            id: document.id,
            envelope_id: document.envelope_id,
            external_document_id: document.external_document_id,
            name: document.name,
            document_type: document.document_type,
            file_extension: document.file_extension,
            sort_order: document.sort_order,
            size_bytes: document.size_bytes,
            content_hash: document.content_hash,
            uploaded: document.uploaded,
            uploaded_at: document.uploaded_at,
            created_at: document.created_at,
        }
    }
}

/// Response for an envelope, with its archived documents embedded.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnvelopeResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: EnvelopeId,
    pub external_id: String,
    pub subject: String,
    pub status: String,
    pub sender_name: String,
    pub sender_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voided_reason: Option<String>,
    pub documents_fetched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub documents: Vec<DocumentResponse>,
}

impl EnvelopeResponse {
    pub fn from_parts(envelope: Envelope, documents: Vec<EnvelopeDocument>) -> Self {
        Self {
            id: envelope.id,
            external_id: envelope.external_id,
            subject: envelope.subject,
            status: envelope.status,
            sender_name: envelope.sender_name,
            sender_email: envelope.sender_email,
            sent_at: envelope.sent_at,
            completed_at: envelope.completed_at,
            voided_at: envelope.voided_at,
            voided_reason: envelope.voided_reason,
            documents_fetched: envelope.documents_fetched,
            documents_fetched_at: envelope.documents_fetched_at,
            created_at: envelope.created_at,
            updated_at: envelope.updated_at,
            documents: documents.into_iter().map(Into::into).collect(),
        }
    }
}

/// Time-limited download link for an archived document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadUrlResponse {
    #[schema(value_type = String, format = "uuid")]
    pub document_id: DocumentId,
    pub url: String,
    pub expires_in_secs: u64,
}
