//! Signing-provider gateway.
//!
//! The processing core talks to the e-signature provider only through the
//! [`ProviderGateway`] trait. Production uses [`DocuSignClient`]; tests use
//! [`fake::FakeProvider`].

pub mod docusign;
pub mod fake;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::db::models::envelopes::EnvelopeCreate;

/// A document as listed by the provider, before download.
#[derive(Debug, Clone)]
pub struct DocumentListing {
    pub external_document_id: String,
    pub name: String,
    pub document_type: String,
    pub file_extension: String,
    pub sort_order: i32,
}

/// Errors from provider API calls. All of them abort the current processing
/// attempt and surface as a retriable failure on the webhook event.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

/// Capability interface for the signing provider's envelope API.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Fetch full envelope metadata for a provider envelope id.
    async fn get_envelope(&self, external_id: &str) -> Result<EnvelopeCreate, ProviderError>;

    /// List the envelope's documents. The provider's sentinel "certificate"
    /// pseudo-document is excluded.
    async fn list_documents(&self, external_id: &str) -> Result<Vec<DocumentListing>, ProviderError>;

    /// Download a single document's bytes.
    async fn download_document(&self, external_id: &str, external_document_id: &str) -> Result<Bytes, ProviderError>;
}

pub use docusign::DocuSignClient;
