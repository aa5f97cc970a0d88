//! Webhook ingestion and document archival service for e-signature
//! envelopes.
//!
//! The service receives signed webhook notifications from a document-signing
//! provider, verifies them, and archives the completed envelope's documents
//! into S3-compatible object storage. Every notification is persisted before
//! processing starts, so nothing is lost to a transient failure; failed
//! events are retried with exponential backoff by a background scheduler.
//!
//! # Architecture
//!
//! - **[`api`]**: HTTP surface (ingestion endpoint, event inspection, manual
//!   retry, envelope projections, presigned downloads)
//! - **[`webhooks`]**: Signature verification, payload extraction, the event
//!   state machine, and the retry scheduler
//! - **[`db`]**: Persistence behind the [`EventStore`](db::EventStore) trait
//!   (Postgres in production, in-memory for tests)
//! - **[`provider`]**: Signing-provider API client behind
//!   [`ProviderGateway`](provider::ProviderGateway)
//! - **[`storage`]**: Object storage behind [`ObjectStore`](storage::ObjectStore)
//!
//! # Usage
//!
//! ```rust,no_run
//! use envault::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     // Run with graceful shutdown on Ctrl+C
//!     let shutdown = async { tokio::signal::ctrl_c().await.unwrap() };
//!     Application::new(config).await?.serve(shutdown).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod provider;
pub mod storage;
pub mod telemetry;
pub mod types;
pub mod webhooks;

use std::sync::Arc;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use config::Config;

use crate::db::store::EventStore;
use crate::db::PgEventStore;
use crate::provider::docusign::DocuSignClient;
use crate::provider::ProviderGateway;
use crate::storage::s3::S3ObjectStore;
use crate::storage::ObjectStore;
use crate::webhooks::{ProcessorConfig, RetryScheduler, WebhookProcessor};

/// Shared state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EventStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub processor: WebhookProcessor,
    pub config: Config,
}

/// Get the database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// The running application: router, state, and background services.
///
/// Construction wires all adapters together; [`serve`](Application::serve)
/// binds the listener and runs until the shutdown future resolves, then
/// cancels the retry scheduler and waits for it to drain.
pub struct Application {
    router: Router,
    config: Config,
    shutdown_token: CancellationToken,
    scheduler_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Application {
    /// Create a new application instance against production adapters:
    /// Postgres, the provider's REST API, and S3-compatible storage.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting envelope archival service with configuration: {:#?}", config);

        let pool = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
        migrator().run(&pool).await?;

        let store: Arc<dyn EventStore> = Arc::new(PgEventStore::new(pool));
        let provider: Arc<dyn ProviderGateway> = Arc::new(DocuSignClient::new(&config.provider)?);
        let objects: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(&config.storage));

        Ok(Self::with_adapters(config, store, provider, objects))
    }

    /// Wire the application from explicit adapters. Used directly by tests
    /// with in-memory implementations.
    pub fn with_adapters(
        config: Config,
        store: Arc<dyn EventStore>,
        provider: Arc<dyn ProviderGateway>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let processor = WebhookProcessor::new(
            store.clone(),
            provider,
            objects.clone(),
            ProcessorConfig {
                hmac_secret: config.webhook.hmac_secret.clone(),
                default_bucket: config.webhook.default_bucket.clone(),
            },
        );

        let shutdown_token = CancellationToken::new();
        let scheduler_handle = if config.retry.enabled {
            let scheduler = RetryScheduler::new(store.clone(), processor.clone(), config.retry.clone());
            Some(tokio::spawn(scheduler.run(shutdown_token.clone())))
        } else {
            info!("Retry scheduler disabled by configuration");
            None
        };

        let state = AppState {
            store,
            objects,
            processor,
            config: config.clone(),
        };
        let router = api::router(state);

        Self {
            router,
            config,
            shutdown_token,
            scheduler_handle,
        }
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Envelope archival service listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Stop the retry scheduler and wait for the in-flight tick
        self.shutdown_token.cancel();
        if let Some(handle) = self.scheduler_handle {
            let _ = handle.await;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
