//! Document validation errors.

use uuid::Uuid;

/// A document failed its schema check and must not reach the index.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid {entity} document {id}: {reason}")]
pub struct DocumentError {
    /// Document kind (`film`, `person`, `genre`).
    pub entity: &'static str,
    pub id: Uuid,
    pub reason: String,
}

impl DocumentError {
    pub fn new(entity: &'static str, id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            entity,
            id,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_entity_and_id() {
        let id = Uuid::from_u128(7);
        let err = DocumentError::new("film", id, "title must not be blank");
        let msg = err.to_string();
        assert!(msg.contains("film"), "got: {msg}");
        assert!(msg.contains(&id.to_string()), "got: {msg}");
        assert!(msg.contains("title must not be blank"), "got: {msg}");
    }
}
