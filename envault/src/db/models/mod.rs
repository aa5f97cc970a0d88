//! Database model definitions.

pub mod envelopes;
pub mod events;
