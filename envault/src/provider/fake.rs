//! Fake provider adapter for tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::db::models::envelopes::EnvelopeCreate;
use crate::provider::{DocumentListing, ProviderError, ProviderGateway};

/// In-memory [`ProviderGateway`] with scriptable failures and call counters.
#[derive(Default)]
pub struct FakeProvider {
    envelopes: Mutex<HashMap<String, EnvelopeCreate>>,
    documents: Mutex<HashMap<String, Vec<(DocumentListing, Bytes)>>>,
    /// Document ids whose download should fail
    failing_downloads: Mutex<Vec<String>>,
    fail_metadata: Mutex<bool>,
    pub metadata_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an envelope with the given documents (id, name, bytes).
    pub fn with_envelope(self, external_id: &str, docs: Vec<(&str, &str, &[u8])>) -> Self {
        self.add_envelope(external_id, docs);
        self
    }

    pub fn add_envelope(&self, external_id: &str, docs: Vec<(&str, &str, &[u8])>) {
        let envelope = EnvelopeCreate {
            external_id: external_id.to_string(),
            subject: format!("Envelope {external_id}"),
            status: "completed".to_string(),
            sender_name: "Test Sender".to_string(),
            sender_email: "sender@example.com".to_string(),
            sent_at: None,
            completed_at: Some(chrono::Utc::now()),
            voided_at: None,
            voided_reason: None,
        };
        self.envelopes.lock().unwrap().insert(external_id.to_string(), envelope);

        let listings = docs
            .into_iter()
            .enumerate()
            .map(|(i, (id, name, bytes))| {
                let listing = DocumentListing {
                    external_document_id: id.to_string(),
                    name: name.to_string(),
                    document_type: "content".to_string(),
                    file_extension: name.rsplit_once('.').map(|(_, e)| e.to_string()).unwrap_or_else(|| "pdf".to_string()),
                    sort_order: i as i32 + 1,
                };
                (listing, Bytes::copy_from_slice(bytes))
            })
            .collect();
        self.documents.lock().unwrap().insert(external_id.to_string(), listings);
    }

    /// Make downloads of the given document id fail with an upstream error.
    pub fn fail_download(&self, external_document_id: &str) {
        self.failing_downloads.lock().unwrap().push(external_document_id.to_string());
    }

    /// Make metadata fetches fail with an upstream error.
    pub fn fail_metadata(&self, fail: bool) {
        *self.fail_metadata.lock().unwrap() = fail;
    }

    fn upstream_error(what: &str) -> ProviderError {
        ProviderError::Status {
            code: 502,
            body: format!("injected {what} failure"),
        }
    }
}

#[async_trait]
impl ProviderGateway for FakeProvider {
    async fn get_envelope(&self, external_id: &str) -> Result<EnvelopeCreate, ProviderError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_metadata.lock().unwrap() {
            return Err(Self::upstream_error("metadata"));
        }
        self.envelopes
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or(ProviderError::Status {
                code: 404,
                body: format!("unknown envelope {external_id}"),
            })
    }

    async fn list_documents(&self, external_id: &str) -> Result<Vec<DocumentListing>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(external_id)
            .map(|docs| docs.iter().map(|(listing, _)| listing.clone()).collect())
            .unwrap_or_default())
    }

    async fn download_document(&self, external_id: &str, external_document_id: &str) -> Result<Bytes, ProviderError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_downloads.lock().unwrap().iter().any(|id| id == external_document_id) {
            return Err(Self::upstream_error("download"));
        }
        self.documents
            .lock()
            .unwrap()
            .get(external_id)
            .and_then(|docs| {
                docs.iter()
                    .find(|(listing, _)| listing.external_document_id == external_document_id)
                    .map(|(_, bytes)| bytes.clone())
            })
            .ok_or(ProviderError::Status {
                code: 404,
                body: format!("unknown document {external_document_id}"),
            })
    }
}
