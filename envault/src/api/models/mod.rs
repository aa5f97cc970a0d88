//! Request/response data structures for API communication.

pub mod envelopes;
pub mod webhooks;
