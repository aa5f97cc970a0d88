//! HTTP API integration tests over in-memory adapters.

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use envault::api::models::envelopes::{DocumentResponse, DownloadUrlResponse, EnvelopeResponse};
use envault::api::models::webhooks::{HealthResponse, IngestResponse, RetryResponse, WebhookEventResponse};
use envault::db::models::events::ProcessingState;
use envault::db::{EventStore, InMemoryEventStore};
use envault::provider::fake::FakeProvider;
use envault::storage::InMemoryObjectStore;
use envault::webhooks::{ProcessorConfig, WebhookProcessor, signing};
use envault::{AppState, Config};

const COMPLETED_PAYLOAD: &str = r#"{"event":"envelope-completed","data":{"envelopeId":"env123"}}"#;

struct Harness {
    server: TestServer,
    store: Arc<InMemoryEventStore>,
}

fn harness_with(provider: FakeProvider, secret: &str) -> Harness {
    let mut config = Config::default();
    config.webhook.hmac_secret = secret.to_string();
    // The scheduler is exercised in its own unit tests; API tests drive
    // retries through the endpoint.
    config.retry.enabled = false;

    let store = Arc::new(InMemoryEventStore::new());
    let objects = Arc::new(InMemoryObjectStore::new());
    let processor = WebhookProcessor::new(
        store.clone(),
        Arc::new(provider),
        objects.clone(),
        ProcessorConfig {
            hmac_secret: config.webhook.hmac_secret.clone(),
            default_bucket: config.webhook.default_bucket.clone(),
        },
    );

    let state = AppState {
        store: store.clone(),
        objects,
        processor,
        config,
    };
    let server = TestServer::new(envault::api::router(state)).expect("test server should build");
    Harness { server, store }
}

fn harness() -> Harness {
    harness_with(
        FakeProvider::new().with_envelope("env123", vec![("1", "contract.pdf", b"%PDF-1.7 contract")]),
        "",
    )
}

/// Wait for the background processing task to reach a settled state.
async fn wait_until_settled(store: &InMemoryEventStore, id: uuid::Uuid) -> ProcessingState {
    for _ in 0..100 {
        let event = store.get_event(id).await.unwrap().unwrap();
        let state = event.state();
        if state != ProcessingState::Pending && state != ProcessingState::Processing {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("event never settled");
}

#[tokio::test]
async fn health_endpoint() {
    let h = harness();
    let response = h.server.get("/api/webhooks/health").await;
    response.assert_status_ok();
    let body: HealthResponse = response.json();
    assert_eq!(body.status, "ok");
    assert!(!body.version.is_empty());
}

#[test_log::test(tokio::test)]
async fn webhook_ingest_to_completion() {
    let h = harness();

    let response = h.server.post("/api/webhooks/docusign").text(COMPLETED_PAYLOAD).await;
    response.assert_status_ok();
    let ack: IngestResponse = response.json();

    let state = wait_until_settled(&h.store, ack.event_id).await;
    assert_eq!(state, ProcessingState::Completed);

    // Event is inspectable over the API
    let response = h.server.get(&format!("/api/webhooks/docusign/{}", ack.event_id)).await;
    response.assert_status_ok();
    let event: WebhookEventResponse = response.json();
    assert_eq!(event.processing_state, ProcessingState::Completed);
    assert_eq!(event.envelope_id, "env123");
    assert_eq!(event.attempt_count, 1);
    let envelope_record_id = event.envelope_record_id.expect("should link an envelope");

    // The envelope projection includes the archived document
    let response = h.server.get(&format!("/api/envelopes/{envelope_record_id}")).await;
    response.assert_status_ok();
    let envelope: EnvelopeResponse = response.json();
    assert_eq!(envelope.external_id, "env123");
    assert!(envelope.documents_fetched);
    assert_eq!(envelope.documents.len(), 1);
    assert_eq!(envelope.documents[0].name, "contract.pdf");
    assert!(envelope.documents[0].uploaded);
}

#[tokio::test]
async fn ignored_event_end_to_end() {
    let h = harness();

    let raw = r#"{"event":"recipient-sent","envelopeId":"env999","status":"sent"}"#;
    let response = h.server.post("/api/webhooks/docusign").text(raw).await;
    response.assert_status_ok();
    let ack: IngestResponse = response.json();

    let state = wait_until_settled(&h.store, ack.event_id).await;
    assert_eq!(state, ProcessingState::Ignored);

    // No envelope materialized
    let response = h.server.get("/api/envelopes/external/env999").await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn invalid_signature_is_rejected() {
    let h = harness_with(
        FakeProvider::new().with_envelope("env123", vec![("1", "contract.pdf", b"bytes")]),
        "connect-secret",
    );

    let response = h
        .server
        .post("/api/webhooks/docusign")
        .add_header("x-docusign-signature-1", "bogus")
        .text(COMPLETED_PAYLOAD)
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn valid_signature_is_accepted() {
    let h = harness_with(
        FakeProvider::new().with_envelope("env123", vec![("1", "contract.pdf", b"bytes")]),
        "connect-secret",
    );

    let signature = signing::compute_signature(COMPLETED_PAYLOAD, "connect-secret").unwrap();
    let response = h
        .server
        .post("/api/webhooks/docusign")
        .add_header("x-docusign-signature-1", signature)
        .text(COMPLETED_PAYLOAD)
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn unknown_event_returns_not_found() {
    let h = harness();
    let response = h.server.get(&format!("/api/webhooks/docusign/{}", uuid::Uuid::new_v4())).await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn retry_rejected_for_terminal_and_inflight_events() {
    let h = harness();

    let response = h.server.post("/api/webhooks/docusign").text(COMPLETED_PAYLOAD).await;
    let ack: IngestResponse = response.json();
    wait_until_settled(&h.store, ack.event_id).await;

    let response = h.server.post(&format!("/api/webhooks/docusign/{}/retry", ack.event_id)).await;
    response.assert_status_bad_request();
    assert!(response.text().contains("already completed"));

    let response = h.server.post(&format!("/api/webhooks/docusign/{}/retry", uuid::Uuid::new_v4())).await;
    response.assert_status_not_found();
}

#[test_log::test(tokio::test)]
async fn manual_retry_recovers_failed_event() {
    // Provider knows nothing, so the first attempt fails
    let h = harness_with(FakeProvider::new(), "");

    let response = h.server.post("/api/webhooks/docusign").text(COMPLETED_PAYLOAD).await;
    let ack: IngestResponse = response.json();
    let state = wait_until_settled(&h.store, ack.event_id).await;
    assert_eq!(state, ProcessingState::Failed);

    let event = h.store.get_event(ack.event_id).await.unwrap().unwrap();
    assert!(event.last_error.as_deref().unwrap().starts_with("[attempt 1]"));

    // The retry endpoint accepts failed events even without recovery; the
    // attempt fails again but the count advances.
    let response = h.server.post(&format!("/api/webhooks/docusign/{}/retry", ack.event_id)).await;
    response.assert_status_ok();
    let retry: RetryResponse = response.json();
    assert_eq!(retry.event_id, ack.event_id);

    let state = wait_until_settled(&h.store, ack.event_id).await;
    assert_eq!(state, ProcessingState::Failed);
    let event = h.store.get_event(ack.event_id).await.unwrap().unwrap();
    assert_eq!(event.attempt_count, 2);
}

#[tokio::test]
async fn envelope_listing_and_documents() {
    let h = harness();

    let response = h.server.post("/api/webhooks/docusign").text(COMPLETED_PAYLOAD).await;
    let ack: IngestResponse = response.json();
    wait_until_settled(&h.store, ack.event_id).await;

    let response = h.server.get("/api/envelopes").await;
    response.assert_status_ok();
    let envelopes: Vec<EnvelopeResponse> = response.json();
    assert_eq!(envelopes.len(), 1);
    let envelope_id = envelopes[0].id;

    let response = h.server.get("/api/envelopes/external/env123").await;
    response.assert_status_ok();

    let response = h.server.get(&format!("/api/envelopes/{envelope_id}/documents")).await;
    response.assert_status_ok();
    let documents: Vec<DocumentResponse> = response.json();
    assert_eq!(documents.len(), 1);

    // Presigned download URL for the archived document
    let response = h.server.get(&format!("/api/documents/{}/download-url", documents[0].id)).await;
    response.assert_status_ok();
    let link: DownloadUrlResponse = response.json();
    assert_eq!(link.document_id, documents[0].id);
    assert!(link.url.contains("env123/1_contract.pdf"));
    assert_eq!(link.expires_in_secs, 900);

    // Unknown document
    let response = h.server.get(&format!("/api/documents/{}/download-url", uuid::Uuid::new_v4())).await;
    response.assert_status_not_found();

    // Unknown envelope's documents
    let response = h.server.get(&format!("/api/envelopes/{}/documents", uuid::Uuid::new_v4())).await;
    response.assert_status_not_found();
}
