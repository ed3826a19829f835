use crate::connection::ConnectionPool;
use crate::core::{Record, Result};
use crate::transaction::Transaction;
use std::sync::Arc;
use tracing::warn;

/// Where a repository call runs
#[derive(Debug, Clone)]
pub enum Executor {
    /// No ambient transaction: every call borrows a pooled connection and
    /// runs in its own short transaction (auto-commit).
    Pooled(ConnectionPool),

    /// The handle published by the enclosing transactional operation
    Transaction(Arc<Transaction>),
}

impl Executor {
    pub fn is_transactional(&self) -> bool {
        matches!(self, Executor::Transaction(_))
    }

    pub async fn get(&self, table: &str, id: &str) -> Result<Option<Record>> {
        match self {
            Executor::Transaction(tx) => tx.get(table, id).await,
            Executor::Pooled(pool) => {
                let _guard = pool.get_connection().await?;
                Ok(pool.database().read_row(table, id)?.map(|row| row.data))
            }
        }
    }

    pub async fn scan(&self, table: &str) -> Result<Vec<(String, Record)>> {
        match self {
            Executor::Transaction(tx) => tx.scan(table).await,
            Executor::Pooled(pool) => {
                let _guard = pool.get_connection().await?;
                let rows = pool.database().read_rows(table)?;
                Ok(rows.into_iter().map(|(id, row)| (id, row.data)).collect())
            }
        }
    }

    pub async fn insert(&self, table: &str, id: &str, record: Record) -> Result<()> {
        match self {
            Executor::Transaction(tx) => tx.insert(table, id, record).await,
            Executor::Pooled(pool) => {
                let tx = pool.begin().await?;
                let result = tx.insert(table, id, record).await;
                auto_commit(tx, result).await
            }
        }
    }

    pub async fn update(&self, table: &str, id: &str, record: Record) -> Result<()> {
        match self {
            Executor::Transaction(tx) => tx.update(table, id, record).await,
            Executor::Pooled(pool) => {
                let tx = pool.begin().await?;
                let result = tx.update(table, id, record).await;
                auto_commit(tx, result).await
            }
        }
    }

    pub async fn upsert(&self, table: &str, id: &str, record: Record) -> Result<()> {
        match self {
            Executor::Transaction(tx) => tx.upsert(table, id, record).await,
            Executor::Pooled(pool) => {
                let tx = pool.begin().await?;
                let result = tx.upsert(table, id, record).await;
                auto_commit(tx, result).await
            }
        }
    }

    pub async fn delete(&self, table: &str, id: &str) -> Result<bool> {
        match self {
            Executor::Transaction(tx) => tx.delete(table, id).await,
            Executor::Pooled(pool) => {
                let tx = pool.begin().await?;
                let result = tx.delete(table, id).await;
                auto_commit(tx, result).await
            }
        }
    }
}

async fn auto_commit<T>(tx: Transaction, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "auto-commit rollback failed");
            }
            Err(err)
        }
    }
}
