use thiserror::Error;

/// Errors that can arise in the progression and economy engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, config files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when a referenced entity (deck, card catalog entry) is
    /// missing. Absent progress documents are defaulted instead.
    #[error("not found: {0}")]
    NotFound(String),

    /// Purchase attempted with balance below cost. Nothing is mutated.
    #[error("insufficient tokens: need {needed}, have {balance}")]
    InsufficientTokens { needed: i64, balance: i64 },

    /// The store detected a conflicting concurrent write that it could not
    /// absorb; the whole operation must be retried from scratch. The built-in
    /// sled store retries conflicts internally and never surfaces this; it
    /// exists for store backends that cannot.
    #[error("transaction conflict, retry the operation")]
    TransactionConflict,

    /// A persisted session document could not be decoded. Stale card
    /// references inside an otherwise valid session are filtered, not fatal.
    #[error("malformed session: {0}")]
    MalformedSession(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Configuration failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl From<sled::transaction::TransactionError<EngineError>> for EngineError {
    fn from(err: sled::transaction::TransactionError<EngineError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(e) => EngineError::Sled(e),
        }
    }
}
