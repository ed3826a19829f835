use crate::core::{DbError, Record, Result, StoredRow, column};
use std::collections::BTreeMap;

/// Table metadata: name and the columns that must hold unique values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    unique: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: Vec::new(),
        }
    }

    /// Declare a unique column
    pub fn unique(mut self, column: impl Into<String>) -> Self {
        self.unique.push(column.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_columns(&self) -> &[String] {
        &self.unique
    }

    /// Find the first unique column on which `record` collides with one of
    /// `rows`. Rows with the same primary key as `id` are skipped.
    pub fn find_unique_collision<'a, I>(&self, id: &str, record: &Record, rows: I) -> Option<String>
    where
        I: IntoIterator<Item = (&'a str, &'a Record)> + Clone,
    {
        for unique in &self.unique {
            let Some(value) = column(record, unique) else {
                continue;
            };

            let collides = rows
                .clone()
                .into_iter()
                .any(|(other_id, other)| other_id != id && column(other, unique) == Some(value));

            if collides {
                return Some(unique.clone());
            }
        }
        None
    }

    pub(crate) fn unique_violation(&self, column: &str, record: &Record) -> DbError {
        let value = record.get(column).map(|v| v.to_string()).unwrap_or_default();
        DbError::ConstraintViolation(format!(
            "duplicate key value violates unique constraint {}.{} ({})",
            self.name, column, value
        ))
    }
}

/// Committed rows of one table, ordered by primary key
#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<String, StoredRow>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn get(&self, id: &str) -> Option<&StoredRow> {
        self.rows.get(id)
    }

    pub fn version_of(&self, id: &str) -> Option<u64> {
        self.rows.get(id).map(|row| row.version)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&String, &StoredRow)> + Clone {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Replace (or remove, with `None`) a row, returning the previous one
    pub(crate) fn put(&mut self, id: &str, row: Option<StoredRow>) -> Option<StoredRow> {
        match row {
            Some(row) => self.rows.insert(id.to_string(), row),
            None => self.rows.remove(id),
        }
    }

    /// Check a committed row against the unique columns of the table
    pub fn check_uniqueness(&self, id: &str, record: &Record) -> Result<()> {
        let rows = self.rows.iter().map(|(k, row)| (k.as_str(), &row.data));
        match self.schema.find_unique_collision(id, record, rows) {
            Some(column) => Err(self.schema.unique_violation(&column, record)),
            None => Ok(()),
        }
    }
}
