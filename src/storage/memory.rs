// ============================================================================
// In-Memory Datastore
// ============================================================================
//
// A named database of versioned tables. Reads go straight to the committed
// state; writes only ever arrive as a whole transaction write set through
// `apply`, which validates row versions (first committer wins) and unique
// columns before the new state becomes visible.
//
// ============================================================================

use super::{Table, TableSchema, WriteSet};
use crate::core::{DbError, Record, Result, StoredRow};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

pub struct Database {
    name: String,
    tables: RwLock<HashMap<String, Table>>,
    next_version: AtomicU64,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(HashMap::new()),
            next_version: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        let mut tables = self.tables.write()?;
        let name = schema.name().to_string();
        if tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }
        debug!(database = %self.name, table = %name, "table created");
        tables.insert(name, Table::new(schema));
        Ok(())
    }

    pub fn has_table(&self, table: &str) -> Result<bool> {
        Ok(self.tables.read()?.contains_key(table))
    }

    pub fn schema(&self, table: &str) -> Result<TableSchema> {
        let tables = self.tables.read()?;
        tables
            .get(table)
            .map(|t| t.schema().clone())
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))
    }

    pub fn read_row(&self, table: &str, id: &str) -> Result<Option<StoredRow>> {
        let tables = self.tables.read()?;
        let table_ref = tables
            .get(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
        Ok(table_ref.get(id).cloned())
    }

    /// All committed rows of a table in primary key order
    pub fn read_rows(&self, table: &str) -> Result<Vec<(String, StoredRow)>> {
        let tables = self.tables.read()?;
        let table_ref = tables
            .get(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
        Ok(table_ref
            .rows()
            .map(|(id, row)| (id.clone(), row.clone()))
            .collect())
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        let tables = self.tables.read()?;
        tables
            .get(table)
            .map(Table::len)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))
    }

    /// Atomically validate and apply a transaction's write set
    pub fn apply(&self, writes: &WriteSet) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut tables = self.tables.write()?;

        for (key, write) in writes {
            let table = tables
                .get(&key.table)
                .ok_or_else(|| DbError::TableNotFound(key.table.clone()))?;
            let current = table.version_of(&key.id);
            if current != write.base_version {
                return Err(DbError::Conflict(format!(
                    "row {}.{} was modified by a concurrent transaction",
                    key.table, key.id
                )));
            }
        }

        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let mut previous: Vec<(&str, &str, Option<StoredRow>)> = Vec::with_capacity(writes.len());

        for (key, write) in writes {
            let table = tables
                .get_mut(&key.table)
                .ok_or_else(|| DbError::TableNotFound(key.table.clone()))?;
            let row = write
                .value
                .as_ref()
                .map(|data| StoredRow::new(version, data.clone()));
            previous.push((key.table.as_str(), key.id.as_str(), table.put(&key.id, row)));
        }

        let violation = writes.iter().find_map(|(key, write)| {
            let data: &Record = write.value.as_ref()?;
            tables
                .get(&key.table)
                .and_then(|table| table.check_uniqueness(&key.id, data).err())
        });

        if let Some(err) = violation {
            for (table, id, row) in previous.into_iter().rev() {
                if let Some(t) = tables.get_mut(table) {
                    t.put(id, row);
                }
            }
            return Err(err);
        }

        debug!(database = %self.name, rows = writes.len(), version, "write set applied");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("name", &self.name).finish()
    }
}
