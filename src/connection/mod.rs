pub mod config;
pub mod pool;
pub mod registry;

use crate::core::{DbError, Result};
use crate::storage::Database;
use std::sync::Arc;

pub use config::ConnectionConfig;
pub use pool::{ConnectionPool, PoolGuard, PoolStats};
pub use registry::{DEFAULT_ALIAS, DataSources};

/// A pooled session on one `Database`
///
/// Data is never read through the connection itself; a `Transaction` owns the
/// connection while it is open and hands it back to the pool when finished.
pub struct Connection {
    id: u64,
    db: Arc<Database>,
    state: SessionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Active,
    InTransaction,
    Closed,
}

impl Connection {
    pub(crate) fn new(id: u64, db: Arc<Database>) -> Self {
        Self {
            id,
            db,
            state: SessionState::Active,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Claim the session for a new transaction
    pub fn begin(&mut self) -> Result<()> {
        match self.state {
            SessionState::Active => {
                self.state = SessionState::InTransaction;
                Ok(())
            }
            SessionState::InTransaction => Err(DbError::ExecutionError(format!(
                "connection {} already carries a transaction",
                self.id
            ))),
            SessionState::Closed => Err(DbError::ExecutionError(format!("connection {} is closed", self.id))),
        }
    }

    /// Release the session after commit or rollback
    pub fn finish(&mut self) {
        if self.state == SessionState::InTransaction {
            self.state = SessionState::Active;
        }
    }

    pub fn is_in_transaction(&self) -> bool {
        self.state == SessionState::InTransaction
    }

    /// Not closed
    pub fn is_active(&self) -> bool {
        self.state != SessionState::Closed
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("database", &self.db.name())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> Connection {
        Connection::new(1, Arc::new(Database::new("sessions")))
    }

    #[test]
    fn test_new_connection_is_idle() {
        let conn = connection();
        assert_eq!(conn.id(), 1);
        assert_eq!(conn.database().name(), "sessions");
        assert!(conn.is_active());
        assert!(!conn.is_in_transaction());
    }

    #[test]
    fn test_one_transaction_at_a_time() {
        let mut conn = connection();

        assert!(conn.begin().is_ok());
        assert!(conn.is_in_transaction());
        assert!(conn.begin().is_err());

        conn.finish();
        assert!(!conn.is_in_transaction());
    }

    #[test]
    fn test_closed_connection_rejects_begin() {
        let mut conn = connection();
        conn.close();
        assert!(!conn.is_active());
        assert!(conn.begin().is_err());
    }
}
