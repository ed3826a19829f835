// ============================================================================
// Transaction Handle
// ============================================================================
//
// One open transaction on one datastore. Writes are buffered in a write set
// and only reach the database on commit; reads see committed rows overlaid
// with the transaction's own writes. The pooled connection is held for the
// whole lifetime of the handle and released when it commits, rolls back or
// is dropped.
//
// ============================================================================

use super::{TransactionId, TransactionState};
use crate::connection::PoolGuard;
use crate::core::{DbError, Record, Result};
use crate::storage::{Database, PendingWrite, RowKey, TableSchema, WriteSet};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

pub struct Transaction {
    id: TransactionId,
    database: Arc<Database>,
    inner: Mutex<TxInner>,
    started_at: Instant,
}

struct TxInner {
    state: TransactionState,
    writes: WriteSet,
    guard: Option<PoolGuard>,
}

impl Transaction {
    /// Open a transaction on a borrowed connection
    pub(crate) fn begin(mut guard: PoolGuard) -> Result<Self> {
        let connection = guard
            .connection_mut()
            .ok_or_else(|| DbError::ExecutionError("Connection already returned to pool".into()))?;
        connection.begin()?;
        let database = Arc::clone(connection.database());
        let id = TransactionId::next();

        debug!(txn = %id, database = %database.name(), connection = connection.id(), "transaction started");

        Ok(Self {
            id,
            database,
            inner: Mutex::new(TxInner {
                state: TransactionState::Active,
                writes: WriteSet::new(),
                guard: Some(guard),
            }),
            started_at: Instant::now(),
        })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn state(&self) -> TransactionState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(TransactionState::Aborted)
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Number of rows written so far
    pub fn pending_writes(&self) -> usize {
        self.inner.lock().map(|inner| inner.writes.len()).unwrap_or(0)
    }

    pub fn duration(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    pub async fn get(&self, table: &str, id: &str) -> Result<Option<Record>> {
        tokio::task::yield_now().await;
        let inner = self.active_inner()?;
        self.visible_row(&inner, table, id)
    }

    /// All visible rows of a table in primary key order
    pub async fn scan(&self, table: &str) -> Result<Vec<(String, Record)>> {
        tokio::task::yield_now().await;
        let inner = self.active_inner()?;
        let rows = self.visible_rows(&inner, table)?;
        Ok(rows.into_iter().collect())
    }

    /// Insert a new row; an existing primary key is a constraint violation
    pub async fn insert(&self, table: &str, id: &str, record: Record) -> Result<()> {
        tokio::task::yield_now().await;
        let mut inner = self.active_inner()?;

        if self.visible_row(&inner, table, id)?.is_some() {
            return Err(DbError::ConstraintViolation(format!(
                "duplicate key value violates primary key {}.id ({})",
                table, id
            )));
        }

        self.check_unique(&inner, table, id, &record)?;
        self.record_write(&mut inner, table, id, Some(record))
    }

    /// Replace an existing row
    pub async fn update(&self, table: &str, id: &str, record: Record) -> Result<()> {
        tokio::task::yield_now().await;
        let mut inner = self.active_inner()?;

        if self.visible_row(&inner, table, id)?.is_none() {
            return Err(DbError::RowNotFound(table.to_string(), id.to_string()));
        }

        self.check_unique(&inner, table, id, &record)?;
        self.record_write(&mut inner, table, id, Some(record))
    }

    /// Insert or replace a row
    pub async fn upsert(&self, table: &str, id: &str, record: Record) -> Result<()> {
        tokio::task::yield_now().await;
        let mut inner = self.active_inner()?;
        self.check_unique(&inner, table, id, &record)?;
        self.record_write(&mut inner, table, id, Some(record))
    }

    /// Delete a row, returning whether it was visible
    pub async fn delete(&self, table: &str, id: &str) -> Result<bool> {
        tokio::task::yield_now().await;
        let mut inner = self.active_inner()?;

        if self.visible_row(&inner, table, id)?.is_none() {
            return Ok(false);
        }

        self.record_write(&mut inner, table, id, None)?;
        Ok(true)
    }

    /// Apply the write set to the database and release the connection
    ///
    /// A failed commit leaves the transaction aborted; nothing is applied.
    pub async fn commit(&self) -> Result<()> {
        tokio::task::yield_now().await;
        let mut inner = self.active_inner()?;

        let result = self.database.apply(&inner.writes);
        let rows = inner.writes.len();
        inner.writes.clear();
        inner.state = match result {
            Ok(()) => TransactionState::Committed,
            Err(_) => TransactionState::Aborted,
        };
        inner.guard.take();

        match &result {
            Ok(()) => debug!(
                txn = %self.id,
                database = %self.database.name(),
                rows,
                elapsed_ms = self.duration().as_millis() as u64,
                "transaction committed"
            ),
            Err(err) => warn!(
                txn = %self.id,
                database = %self.database.name(),
                error = %err,
                "transaction commit failed"
            ),
        }

        result
    }

    /// Discard the write set and release the connection
    pub async fn rollback(&self) -> Result<()> {
        tokio::task::yield_now().await;
        let mut inner = self.active_inner()?;
        Self::discard(&mut inner);
        debug!(txn = %self.id, database = %self.database.name(), "transaction rolled back");
        Ok(())
    }

    /// Synchronous rollback for cleanup paths that cannot await
    ///
    /// Returns `false` when the transaction had already finished.
    pub fn abort(&self) -> bool {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !inner.state.is_active() {
            return false;
        }
        Self::discard(&mut inner);
        debug!(txn = %self.id, database = %self.database.name(), "transaction aborted");
        true
    }

    fn discard(inner: &mut TxInner) {
        inner.writes.clear();
        inner.state = TransactionState::Aborted;
        inner.guard.take();
    }

    fn active_inner(&self) -> Result<std::sync::MutexGuard<'_, TxInner>> {
        let inner = self.inner.lock()?;
        if !inner.state.is_active() {
            return Err(DbError::TransactionNotActive(format!(
                "{} ({})",
                self.id, inner.state
            )));
        }
        Ok(inner)
    }

    fn visible_row(&self, inner: &TxInner, table: &str, id: &str) -> Result<Option<Record>> {
        let committed = self.database.read_row(table, id)?;
        match inner.writes.get(&RowKey::new(table, id)) {
            Some(write) => Ok(write.value.clone()),
            None => Ok(committed.map(|row| row.data)),
        }
    }

    fn visible_rows(&self, inner: &TxInner, table: &str) -> Result<BTreeMap<String, Record>> {
        let mut rows: BTreeMap<String, Record> = self
            .database
            .read_rows(table)?
            .into_iter()
            .map(|(id, row)| (id, row.data))
            .collect();

        for (key, write) in inner.writes.iter().filter(|(key, _)| key.table == table) {
            match &write.value {
                Some(value) => rows.insert(key.id.clone(), value.clone()),
                None => rows.remove(&key.id),
            };
        }

        Ok(rows)
    }

    fn check_unique(&self, inner: &TxInner, table: &str, id: &str, record: &Record) -> Result<()> {
        let schema: TableSchema = self.database.schema(table)?;
        if schema.unique_columns().is_empty() {
            return Ok(());
        }

        let rows = self.visible_rows(inner, table)?;
        let view = rows.iter().map(|(k, v)| (k.as_str(), v));
        match schema.find_unique_collision(id, record, view) {
            Some(column) => Err(schema.unique_violation(&column, record)),
            None => Ok(()),
        }
    }

    fn record_write(&self, inner: &mut TxInner, table: &str, id: &str, value: Option<Record>) -> Result<()> {
        let key = RowKey::new(table, id);
        let base_version = match inner.writes.get(&key) {
            Some(existing) => existing.base_version,
            None => self.database.read_row(table, id)?.map(|row| row.version),
        };
        inner.writes.insert(key, PendingWrite { base_version, value });
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let inner = match self.inner.get_mut() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.state.is_active() {
            warn!(txn = %self.id, database = %self.database.name(), "transaction dropped while active, rolling back");
            Self::discard(inner);
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("database", &self.database.name())
            .field("state", &self.state())
            .finish()
    }
}
