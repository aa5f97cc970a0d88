//! DocuSign eSignature REST API adapter for [`ProviderGateway`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::config::ProviderConfig;
use crate::db::models::envelopes::EnvelopeCreate;
use crate::provider::{DocumentListing, ProviderError, ProviderGateway};

/// The provider lists a "certificate" pseudo-document alongside the real
/// ones; it is completion metadata, not envelope content.
const CERTIFICATE_DOCUMENT_ID: &str = "certificate";

/// Client for the DocuSign eSignature REST API (v2.1).
pub struct DocuSignClient {
    http_client: reqwest::Client,
    base_url: String,
    account_id: String,
    access_token: String,
}

impl DocuSignClient {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_id: config.account_id.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn envelope_url(&self, external_id: &str) -> String {
        format!("{}/v2.1/accounts/{}/envelopes/{}", self.base_url, self.account_id, external_id)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                code: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeResponse {
    envelope_id: String,
    email_subject: Option<String>,
    status: Option<String>,
    sender: Option<SenderResponse>,
    sent_date_time: Option<String>,
    completed_date_time: Option<String>,
    voided_date_time: Option<String>,
    voided_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SenderResponse {
    user_name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentListResponse {
    #[serde(default)]
    envelope_documents: Vec<DocumentResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentResponse {
    document_id: String,
    name: Option<String>,
    #[serde(rename = "type")]
    document_type: Option<String>,
    order: Option<String>,
}

/// DocuSign reports timestamps as RFC 3339 strings; anything unparsable
/// degrades to `None` rather than failing the fetch.
fn parse_datetime(value: Option<&str>) -> Option<DateTime<Utc>> {
    value.and_then(|s| DateTime::parse_from_rfc3339(s).ok()).map(|dt| dt.with_timezone(&Utc))
}

fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_string(),
        _ => "pdf".to_string(),
    }
}

#[async_trait]
impl ProviderGateway for DocuSignClient {
    #[instrument(skip(self), err)]
    async fn get_envelope(&self, external_id: &str) -> Result<EnvelopeCreate, ProviderError> {
        let url = self.envelope_url(external_id);
        let envelope: EnvelopeResponse = self
            .get(&url)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let sender = envelope.sender.unwrap_or(SenderResponse {
            user_name: None,
            email: None,
        });

        Ok(EnvelopeCreate {
            external_id: envelope.envelope_id,
            subject: envelope.email_subject.unwrap_or_else(|| "No Subject".to_string()),
            status: envelope.status.unwrap_or_else(|| "unknown".to_string()),
            sender_name: sender.user_name.unwrap_or_else(|| "unknown".to_string()),
            sender_email: sender.email.unwrap_or_else(|| "unknown".to_string()),
            sent_at: parse_datetime(envelope.sent_date_time.as_deref()),
            completed_at: parse_datetime(envelope.completed_date_time.as_deref()),
            voided_at: parse_datetime(envelope.voided_date_time.as_deref()),
            voided_reason: envelope.voided_reason,
        })
    }

    #[instrument(skip(self), err)]
    async fn list_documents(&self, external_id: &str) -> Result<Vec<DocumentListing>, ProviderError> {
        let url = format!("{}/documents", self.envelope_url(external_id));
        let list: DocumentListResponse = self
            .get(&url)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let documents = list
            .envelope_documents
            .into_iter()
            .filter(|doc| doc.document_id != CERTIFICATE_DOCUMENT_ID)
            .map(|doc| {
                let name = doc.name.unwrap_or_else(|| format!("document_{}", doc.document_id));
                DocumentListing {
                    file_extension: file_extension(&name),
                    external_document_id: doc.document_id,
                    document_type: doc.document_type.unwrap_or_else(|| "pdf".to_string()),
                    sort_order: doc.order.as_deref().and_then(|o| o.parse().ok()).unwrap_or(0),
                    name,
                }
            })
            .collect();

        Ok(documents)
    }

    #[instrument(skip(self), err)]
    async fn download_document(&self, external_id: &str, external_document_id: &str) -> Result<Bytes, ProviderError> {
        let url = format!("{}/documents/{}", self.envelope_url(external_id), external_document_id);
        let bytes = self.get(&url).await?.bytes().await?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> DocuSignClient {
        DocuSignClient::new(&ProviderConfig {
            base_url: server.uri(),
            account_id: "acct1".to_string(),
            access_token: "token123".to_string(),
            timeout_secs: 5,
        })
        .expect("client should build")
    }

    #[tokio::test]
    async fn fetches_envelope_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.1/accounts/acct1/envelopes/env123"))
            .and(header("Authorization", "Bearer token123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "envelopeId": "env123",
                "emailSubject": "Please sign",
                "status": "completed",
                "sender": {"userName": "Ada Lovelace", "email": "ada@example.com"},
                "sentDateTime": "2025-03-01T10:00:00Z",
                "completedDateTime": "2025-03-02T12:30:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let envelope = client_for(&server).get_envelope("env123").await.unwrap();
        assert_eq!(envelope.external_id, "env123");
        assert_eq!(envelope.subject, "Please sign");
        assert_eq!(envelope.status, "completed");
        assert_eq!(envelope.sender_email, "ada@example.com");
        assert!(envelope.sent_at.is_some());
        assert!(envelope.completed_at.is_some());
        assert!(envelope.voided_at.is_none());
    }

    #[tokio::test]
    async fn missing_metadata_degrades_to_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.1/accounts/acct1/envelopes/env9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "envelopeId": "env9",
                "sentDateTime": "not-a-date"
            })))
            .mount(&server)
            .await;

        let envelope = client_for(&server).get_envelope("env9").await.unwrap();
        assert_eq!(envelope.subject, "No Subject");
        assert_eq!(envelope.status, "unknown");
        assert_eq!(envelope.sender_name, "unknown");
        assert!(envelope.sent_at.is_none());
    }

    #[tokio::test]
    async fn lists_documents_and_skips_certificate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.1/accounts/acct1/envelopes/env123/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "envelopeDocuments": [
                    {"documentId": "1", "name": "contract.pdf", "type": "content", "order": "1"},
                    {"documentId": "2", "name": "appendix.docx", "order": "2"},
                    {"documentId": "certificate", "name": "Summary", "order": "3"}
                ]
            })))
            .mount(&server)
            .await;

        let documents = client_for(&server).list_documents("env123").await.unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].external_document_id, "1");
        assert_eq!(documents[0].file_extension, "pdf");
        assert_eq!(documents[0].sort_order, 1);
        assert_eq!(documents[1].file_extension, "docx");
        assert_eq!(documents[1].document_type, "pdf");
    }

    #[tokio::test]
    async fn downloads_document_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.1/accounts/acct1/envelopes/env123/documents/1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 fake".to_vec()))
            .mount(&server)
            .await;

        let bytes = client_for(&server).download_document("env123", "1").await.unwrap();
        assert_eq!(bytes.as_ref(), b"%PDF-1.7 fake");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.1/accounts/acct1/envelopes/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such envelope"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_envelope("missing").await.unwrap_err();
        match err {
            ProviderError::Status { code, body } => {
                assert_eq!(code, 404);
                assert_eq!(body, "no such envelope");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn extension_defaults_to_pdf() {
        assert_eq!(file_extension("contract.pdf"), "pdf");
        assert_eq!(file_extension("notes.docx"), "docx");
        assert_eq!(file_extension("noextension"), "pdf");
        assert_eq!(file_extension("trailingdot."), "pdf");
    }
}
