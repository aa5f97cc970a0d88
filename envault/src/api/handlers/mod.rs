//! Axum route handlers for all API endpoints.

pub mod envelopes;
pub mod webhooks;
