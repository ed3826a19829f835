// ============================================================================
// Context-Aware Repository
// ============================================================================
//
// Data access for one entity type on one datastore alias. The effective
// executor is resolved on every call: inside a transactional operation the
// repository uses the context's handle for its alias, otherwise it borrows a
// pooled connection and runs the call as its own auto-committed transaction.
//
// ============================================================================

pub mod executor;

pub use executor::Executor;

use crate::connection::{ConnectionPool, DEFAULT_ALIAS, DataSources};
use crate::core::{Record, Result, column};
use crate::storage::TableSchema;
use crate::transaction::TransactionContext;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use tracing::trace;

/// A row type stored in one table
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;

    /// Primary key of this row
    fn id(&self) -> String;

    /// Table declaration, including unique columns
    fn schema() -> TableSchema {
        TableSchema::new(Self::TABLE)
    }
}

pub struct Repository<T> {
    alias: String,
    pool: ConnectionPool,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            alias: self.alias.clone(),
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("alias", &self.alias)
            .field("database", &self.pool.database().name())
            .finish()
    }
}

impl<T: Entity> Repository<T> {
    /// Repository on the primary datastore
    pub fn new(sources: &DataSources) -> Result<Self> {
        Self::with_alias(sources, DEFAULT_ALIAS)
    }

    pub fn with_alias(sources: &DataSources, alias: &str) -> Result<Self> {
        let pool = sources.pool(alias)?.clone();
        Ok(Self {
            alias: alias.to_string(),
            pool,
            _entity: PhantomData,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn table(&self) -> &'static str {
        T::TABLE
    }

    /// The executor this call should use
    ///
    /// The active context's handle for this alias when one is bound to the
    /// calling task, the repository's own pool otherwise.
    pub fn current_connection(&self) -> Executor {
        match TransactionContext::current().and_then(|context| context.handle(&self.alias)) {
            Some(tx) => Executor::Transaction(tx),
            None => Executor::Pooled(self.pool.clone()),
        }
    }

    /// Create the table when it does not exist yet
    pub fn ensure_table(&self) -> Result<()> {
        let database = self.pool.database();
        if !database.has_table(T::TABLE)? {
            database.create_table(T::schema())?;
        }
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        let record = self.current_connection().get(T::TABLE, id).await?;
        record.map(decode).transpose()
    }

    /// First row (in primary key order) whose `field` equals `value`
    pub async fn find_one_by(&self, field: &str, value: impl Into<Value>) -> Result<Option<T>> {
        let value = value.into();
        let rows = self.current_connection().scan(T::TABLE).await?;

        rows.into_iter()
            .find(|(_, record)| column(record, field) == Some(&value))
            .map(|(_, record)| decode(record))
            .transpose()
    }

    pub async fn find_by<P>(&self, predicate: P) -> Result<Vec<T>>
    where
        P: Fn(&T) -> bool,
    {
        let mut matched = Vec::new();
        for entity in self.find_all().await? {
            if predicate(&entity) {
                matched.push(entity);
            }
        }
        Ok(matched)
    }

    pub async fn find_all(&self) -> Result<Vec<T>> {
        let rows = self.current_connection().scan(T::TABLE).await?;
        rows.into_iter().map(|(_, record)| decode(record)).collect()
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.current_connection().scan(T::TABLE).await?.len())
    }

    pub async fn insert(&self, entity: &T) -> Result<()> {
        let id = entity.id();
        trace!(table = T::TABLE, id = %id, "insert");
        self.current_connection()
            .insert(T::TABLE, &id, encode(entity)?)
            .await
    }

    pub async fn update(&self, entity: &T) -> Result<()> {
        let id = entity.id();
        trace!(table = T::TABLE, id = %id, "update");
        self.current_connection()
            .update(T::TABLE, &id, encode(entity)?)
            .await
    }

    /// Insert or replace
    pub async fn save(&self, entity: &T) -> Result<()> {
        let id = entity.id();
        trace!(table = T::TABLE, id = %id, "save");
        self.current_connection()
            .upsert(T::TABLE, &id, encode(entity)?)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        trace!(table = T::TABLE, id = %id, "delete");
        self.current_connection().delete(T::TABLE, id).await
    }
}

fn encode<T: Entity>(entity: &T) -> Result<Record> {
    Ok(serde_json::to_value(entity)?)
}

fn decode<T: Entity>(record: Record) -> Result<T> {
    Ok(serde_json::from_value(record)?)
}
