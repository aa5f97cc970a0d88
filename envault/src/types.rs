//! Shared type aliases and small helpers.

use uuid::Uuid;

// Type aliases for IDs
pub type EventId = Uuid;
pub type EnvelopeId = Uuid;
pub type DocumentId = Uuid;

/// Abbreviate a UUID to its first 8 chars for logging.
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbrev_is_prefix() {
        let id = Uuid::new_v4();
        let short = abbrev_uuid(&id);
        assert_eq!(short.len(), 8);
        assert!(id.to_string().starts_with(&short));
    }
}
