//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Webhooks** (`/api/webhooks/docusign*`): Ingestion, event inspection,
//!   manual retry, health
//! - **Envelopes** (`/api/envelopes/*`): Read-only projections of archived
//!   envelopes and their documents
//! - **Documents** (`/api/documents/*`): Presigned download links
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`;
//! interactive documentation is served at `/docs`.

pub mod handlers;
pub mod models;

use axum::{
    Router,
    routing::{get, post},
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api", description = "Envelope archival service")
    ),
    paths(
        handlers::webhooks::receive_webhook,
        handlers::webhooks::get_webhook_event,
        handlers::webhooks::retry_webhook_event,
        handlers::webhooks::health,
        handlers::envelopes::list_envelopes,
        handlers::envelopes::get_envelope,
        handlers::envelopes::get_envelope_by_external_id,
        handlers::envelopes::list_envelope_documents,
        handlers::envelopes::document_download_url,
    ),
    components(schemas(
        models::webhooks::WebhookEventResponse,
        models::webhooks::IngestResponse,
        models::webhooks::RetryResponse,
        models::webhooks::HealthResponse,
        models::envelopes::EnvelopeResponse,
        models::envelopes::DocumentResponse,
        models::envelopes::DownloadUrlResponse,
        crate::db::models::events::ProcessingState,
    ))
)]
pub struct ApiDoc;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/webhooks/docusign", post(handlers::webhooks::receive_webhook))
        .route("/webhooks/docusign/{id}", get(handlers::webhooks::get_webhook_event))
        .route("/webhooks/docusign/{id}/retry", post(handlers::webhooks::retry_webhook_event))
        .route("/webhooks/health", get(handlers::webhooks::health))
        .route("/envelopes", get(handlers::envelopes::list_envelopes))
        .route("/envelopes/{id}", get(handlers::envelopes::get_envelope))
        .route(
            "/envelopes/external/{external_id}",
            get(handlers::envelopes::get_envelope_by_external_id),
        )
        .route("/envelopes/{id}/documents", get(handlers::envelopes::list_envelope_documents))
        .route("/documents/{id}/download-url", get(handlers::envelopes::document_download_url));

    Router::new()
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
