//! Webhook ingestion and processing.

pub mod payload;
pub mod processor;
pub mod retry;
pub mod signing;

pub use processor::{IngestError, ProcessingError, ProcessorConfig, WebhookProcessor};
pub use retry::RetryScheduler;
