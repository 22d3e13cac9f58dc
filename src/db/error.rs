use thiserror::Error;

/// Store-layer failures, partitioned by what the caller should do next.
///
/// `Connection` is the only transient variant: callers retry it with
/// backoff. `Constraint` marks a write rejected by referential integrity
/// or uniqueness rules, typically from out-of-order event delivery; it is
/// logged and dropped. `Query` and `Migration` are permanent.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database constraint violation: {0}")]
    Constraint(String),

    #[error("Database query error: {0}")]
    Query(String),

    #[error("Database migration error: {0}")]
    Migration(String),
}

impl DatabaseError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::Connection(_))
    }
}
