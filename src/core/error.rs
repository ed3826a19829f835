use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Row '{1}' not found in table '{0}'")]
    RowNotFound(String, String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Write-write conflict detected: {0}")]
    Conflict(String),

    #[error("Unknown datastore alias '{0}'")]
    UnknownDataSource(String),

    #[error("Transaction {0} is not active")]
    TransactionNotActive(String),

    #[error("Connection pool timeout: no connections available for '{0}'")]
    PoolTimeout(String),

    #[error("Invalid connection configuration: {0}")]
    InvalidConfig(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl DbError {
    /// Duplicate primary key or unique column value.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::ConstraintViolation(_))
    }

    /// Transient failures a caller may retry with a fresh transaction.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Conflict(_) | DbError::PoolTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
