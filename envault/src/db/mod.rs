//! Persistence layer: models, the `EventStore` capability trait, and its
//! Postgres and in-memory adapters.

pub mod errors;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use errors::DbError;
pub use memory::InMemoryEventStore;
pub use postgres::PgEventStore;
pub use store::EventStore;
