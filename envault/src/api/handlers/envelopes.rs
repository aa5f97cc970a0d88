//! HTTP handlers for envelope and document read endpoints.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use tracing::instrument;

use crate::{
    AppState,
    api::models::envelopes::{DocumentResponse, DownloadUrlResponse, EnvelopeResponse, ListQuery},
    db::EventStore,
    db::models::envelopes::Envelope,
    errors::{Error, Result},
    storage::ObjectStore,
    types::{DocumentId, EnvelopeId},
};

async fn envelope_response(state: &AppState, envelope: Envelope) -> Result<EnvelopeResponse> {
    let documents = state.store.documents_for_envelope(envelope.id).await?;
    Ok(EnvelopeResponse::from_parts(envelope, documents))
}

/// List envelopes, newest first.
#[utoipa::path(
    get,
    path = "/envelopes",
    tag = "envelopes",
    summary = "List envelopes",
    responses(
        (status = 200, description = "List of envelopes", body = [EnvelopeResponse]),
        (status = 500, description = "Internal server error"),
    ),
    params(ListQuery)
)]
#[instrument(skip_all)]
pub async fn list_envelopes(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Result<Json<Vec<EnvelopeResponse>>> {
    let limit = query.limit.clamp(1, 200);
    let offset = query.offset.max(0);

    let envelopes = state.store.list_envelopes(limit, offset).await?;

    let mut responses = Vec::with_capacity(envelopes.len());
    for envelope in envelopes {
        responses.push(envelope_response(&state, envelope).await?);
    }

    Ok(Json(responses))
}

/// Get an envelope by internal id.
#[utoipa::path(
    get,
    path = "/envelopes/{id}",
    tag = "envelopes",
    summary = "Get envelope",
    responses(
        (status = 200, description = "Envelope with documents", body = EnvelopeResponse),
        (status = 404, description = "Envelope not found"),
        (status = 500, description = "Internal server error"),
    ),
    params(
        ("id" = uuid::Uuid, Path, description = "Envelope ID"),
    )
)]
#[instrument(skip_all, fields(envelope_id = %id))]
pub async fn get_envelope(State(state): State<AppState>, Path(id): Path<EnvelopeId>) -> Result<Json<EnvelopeResponse>> {
    let envelope = state.store.get_envelope(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Envelope".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(envelope_response(&state, envelope).await?))
}

/// Get an envelope by its provider-side id.
#[utoipa::path(
    get,
    path = "/envelopes/external/{external_id}",
    tag = "envelopes",
    summary = "Get envelope by provider id",
    responses(
        (status = 200, description = "Envelope with documents", body = EnvelopeResponse),
        (status = 404, description = "Envelope not found"),
        (status = 500, description = "Internal server error"),
    ),
    params(
        ("external_id" = String, Path, description = "Provider envelope ID"),
    )
)]
#[instrument(skip_all, fields(external_id = %external_id))]
pub async fn get_envelope_by_external_id(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<Json<EnvelopeResponse>> {
    let envelope = state
        .store
        .find_envelope_by_external_id(&external_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Envelope".to_string(),
            id: external_id.clone(),
        })?;

    Ok(Json(envelope_response(&state, envelope).await?))
}

/// List the archived documents of an envelope.
#[utoipa::path(
    get,
    path = "/envelopes/{id}/documents",
    tag = "envelopes",
    summary = "List envelope documents",
    responses(
        (status = 200, description = "Archived documents", body = [DocumentResponse]),
        (status = 404, description = "Envelope not found"),
        (status = 500, description = "Internal server error"),
    ),
    params(
        ("id" = uuid::Uuid, Path, description = "Envelope ID"),
    )
)]
#[instrument(skip_all, fields(envelope_id = %id))]
pub async fn list_envelope_documents(State(state): State<AppState>, Path(id): Path<EnvelopeId>) -> Result<Json<Vec<DocumentResponse>>> {
    // 404 for an unknown envelope instead of an empty list
    if state.store.get_envelope(id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Envelope".to_string(),
            id: id.to_string(),
        });
    }

    let documents = state.store.documents_for_envelope(id).await?;
    Ok(Json(documents.into_iter().map(Into::into).collect()))
}

/// Generate a time-limited download link for an archived document.
#[utoipa::path(
    get,
    path = "/documents/{id}/download-url",
    tag = "envelopes",
    summary = "Get document download URL",
    description = "Returns a presigned URL for the archived document. The URL expires after the configured TTL.",
    responses(
        (status = 200, description = "Presigned download URL", body = DownloadUrlResponse),
        (status = 404, description = "Document not found or not yet uploaded"),
        (status = 500, description = "Internal server error"),
    ),
    params(
        ("id" = uuid::Uuid, Path, description = "Document ID"),
    )
)]
#[instrument(skip_all, fields(document_id = %id))]
pub async fn document_download_url(State(state): State<AppState>, Path(id): Path<DocumentId>) -> Result<Json<DownloadUrlResponse>> {
    let document = state.store.get_document(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Document".to_string(),
        id: id.to_string(),
    })?;

    let (Some(bucket), Some(key)) = (document.storage_bucket.as_deref(), document.storage_key.as_deref()) else {
        return Err(Error::NotFound {
            resource: "Document content".to_string(),
            id: id.to_string(),
        });
    };
    if !document.uploaded {
        return Err(Error::NotFound {
            resource: "Document content".to_string(),
            id: id.to_string(),
        });
    }

    let ttl = Duration::from_secs(state.config.webhook.presign_ttl_secs);
    let url = state.objects.presigned_url(bucket, key, ttl).await?;

    Ok(Json(DownloadUrlResponse {
        document_id: id,
        url,
        expires_in_secs: ttl.as_secs(),
    }))
}
