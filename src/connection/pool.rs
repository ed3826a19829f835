use super::{Connection, config::ConnectionConfig};
use crate::core::{DbError, Result};
use crate::storage::Database;
use crate::transaction::Transaction;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Bounded set of sessions on one `Database`
///
/// Cloning shares the pool. Each permit of the semaphore stands for one
/// session that may be checked out, so `get_connection` parks the caller
/// until a guard is dropped or `connect_timeout` runs out.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<Shared>,
}

struct Shared {
    config: ConnectionConfig,
    db: Arc<Database>,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<IdleSession>>,
    checked_out: AtomicUsize,
    next_id: AtomicU64,
}

struct IdleSession {
    connection: Connection,
    opened_at: Instant,
    parked_at: Instant,
}

impl IdleSession {
    fn is_stale(&self, config: &ConnectionConfig) -> bool {
        let too_old = config
            .max_lifetime
            .is_some_and(|lifetime| self.opened_at.elapsed() > lifetime);
        let idle_too_long = config
            .idle_timeout
            .is_some_and(|timeout| self.parked_at.elapsed() > timeout);
        too_old || idle_too_long
    }
}

impl Shared {
    fn open_session(&self) -> Connection {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Connection::new(id, Arc::clone(&self.db))
    }

    /// Reuse the most recently parked session that is still fresh
    fn take_idle(&self) -> Result<Option<(Connection, Instant)>> {
        let mut idle = self.idle.lock()?;
        while let Some(session) = idle.pop() {
            if session.is_stale(&self.config) {
                debug!(database = %self.db.name(), connection = session.connection.id(), "discarding stale connection");
                continue;
            }
            return Ok(Some((session.connection, session.opened_at)));
        }
        Ok(None)
    }
}

impl ConnectionPool {
    /// Pool over a fresh database named after `config.database`
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let db = Arc::new(Database::new(config.database.clone()));
        Self::new_with_db(config, db)
    }

    pub fn new_with_db(config: ConnectionConfig, db: Arc<Database>) -> Result<Self> {
        config.validate()?;

        let now = Instant::now();
        let shared = Shared {
            permits: Arc::new(Semaphore::new(config.max_connections)),
            idle: Mutex::new(Vec::with_capacity(config.max_connections)),
            checked_out: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            config,
            db,
        };
        {
            let mut idle = shared.idle.lock()?;
            for _ in 0..shared.config.min_connections {
                idle.push(IdleSession {
                    connection: shared.open_session(),
                    opened_at: now,
                    parked_at: now,
                });
            }
        }

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.shared.db
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Check out a session, waiting at most `connect_timeout` for one to free up
    pub async fn get_connection(&self) -> Result<PoolGuard> {
        let shared = &self.shared;
        let acquire = Arc::clone(&shared.permits).acquire_owned();
        let permit = match tokio::time::timeout(shared.config.connect_timeout, acquire).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) | Err(_) => {
                warn!(database = %shared.db.name(), "connection pool exhausted");
                return Err(DbError::PoolTimeout(shared.db.name().to_string()));
            }
        };

        let (connection, opened_at) = match shared.take_idle()? {
            Some(session) => session,
            None => (shared.open_session(), Instant::now()),
        };
        shared.checked_out.fetch_add(1, Ordering::SeqCst);

        Ok(PoolGuard {
            connection: Some(connection),
            opened_at,
            shared: Arc::clone(shared),
            _permit: permit,
        })
    }

    /// Check out a session and open a transaction on it
    pub async fn begin(&self) -> Result<Transaction> {
        let guard = self.get_connection().await?;
        Transaction::begin(guard)
    }

    pub fn stats(&self) -> PoolStats {
        let available = self.shared.idle.lock().map(|idle| idle.len()).unwrap_or(0);
        let active = self.shared.checked_out.load(Ordering::SeqCst);

        PoolStats {
            total_connections: available + active,
            available_connections: available,
            active_connections: active,
            max_connections: self.shared.config.max_connections,
        }
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("database", &self.shared.db.name())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Point-in-time counters of one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} checked out, {} idle (limit {})",
            self.active_connections, self.available_connections, self.max_connections
        )
    }
}

/// A checked-out session
///
/// Dropping the guard parks the session again and frees its permit.
pub struct PoolGuard {
    connection: Option<Connection>,
    opened_at: Instant,
    shared: Arc<Shared>,
    _permit: OwnedSemaphorePermit,
}

impl PoolGuard {
    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn connection_mut(&mut self) -> Option<&mut Connection> {
        self.connection.as_mut()
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        connection.finish();
        self.shared.checked_out.fetch_sub(1, Ordering::SeqCst);

        match self.shared.idle.lock() {
            Ok(mut idle) => idle.push(IdleSession {
                connection,
                opened_at: self.opened_at,
                parked_at: Instant::now(),
            }),
            Err(_) => warn!(connection = connection.id(), "pool lock poisoned, discarding connection"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pool(name: &str, max: usize) -> ConnectionPool {
        let config = ConnectionConfig::new(name)
            .max_connections(max)
            .connect_timeout(Duration::from_millis(100));
        ConnectionPool::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_min_connections_are_opened_eagerly() {
        let pool = ConnectionPool::new(ConnectionConfig::new("eager").min_connections(2)).unwrap();

        let stats = pool.stats();
        assert_eq!((stats.total_connections, stats.available_connections), (2, 2));
    }

    #[tokio::test]
    async fn test_dropped_guard_parks_session() {
        let pool = pool("parking", 5);

        let guard = pool.get_connection().await.unwrap();
        let first_id = guard.connection().map(Connection::id);
        assert!(guard.connection().is_some_and(Connection::is_active));
        assert_eq!(pool.stats().active_connections, 1);
        assert_eq!(pool.stats().available_connections, 0);

        drop(guard);
        assert_eq!(pool.stats().active_connections, 0);

        let reused = pool.get_connection().await.unwrap();
        assert_eq!(reused.connection().map(Connection::id), first_id);
    }

    #[tokio::test]
    async fn test_stale_sessions_are_replaced() {
        let config = ConnectionConfig::new("stale").idle_timeout(Some(Duration::ZERO));
        let pool = ConnectionPool::new(config).unwrap();

        let first = pool.get_connection().await.unwrap().connection().map(Connection::id);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = pool.get_connection().await.unwrap();

        assert_ne!(second.connection().map(Connection::id), first);
    }

    #[tokio::test]
    async fn test_exhausted_pool_times_out() {
        let pool = pool("exhausted", 2);
        let _held = (
            pool.get_connection().await.unwrap(),
            pool.get_connection().await.unwrap(),
        );

        assert!(matches!(pool.get_connection().await, Err(DbError::PoolTimeout(name)) if name == "exhausted"));
    }

    #[tokio::test]
    async fn test_waiter_gets_released_connection() {
        let config = ConnectionConfig::new("waiter")
            .max_connections(1)
            .connect_timeout(Duration::from_secs(2));
        let pool = ConnectionPool::new(config).unwrap();

        let held = pool.get_connection().await.unwrap();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.get_connection().await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(held);

        assert!(waiter.await.unwrap().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ConnectionConfig::new("bad").max_connections(0);
        assert!(matches!(ConnectionPool::new(config), Err(DbError::InvalidConfig(_))));
    }
}
