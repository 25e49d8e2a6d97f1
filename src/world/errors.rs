use thiserror::Error;

/// Errors that can arise while interacting with the world store.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Another transaction changed data this one read. Retried by `tx`.
    #[error("serialization conflict")]
    Conflict,

    /// `tx` hit its attempt bound without a conflict-free commit.
    #[error("serialization conflict persisted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Records disagree with each other (dangling references and the like).
    #[error("invalid world state: {0}")]
    Invalid(String),
}

impl WorldError {
    /// True for a raw conflict and for the error `tx` surfaces after giving up.
    pub fn is_conflict(&self) -> bool {
        matches!(self, WorldError::Conflict | WorldError::RetriesExhausted { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WorldError::NotFound(_))
    }
}
