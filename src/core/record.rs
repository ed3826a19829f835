// ============================================================================
// Stored Records
// ============================================================================
//
// Rows are schemaless JSON objects keyed by a string primary key. Each
// committed row carries a version that transactions use to detect
// concurrent modification.
//
// ============================================================================

use serde_json::Value;

/// A row payload as stored in a table
pub type Record = Value;

/// A committed row together with its version
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub version: u64,
    pub data: Record,
}

impl StoredRow {
    pub fn new(version: u64, data: Record) -> Self {
        Self { version, data }
    }
}

/// Read a column of a record, treating JSON `null` as absent.
pub fn column<'a>(record: &'a Record, name: &str) -> Option<&'a Value> {
    record.get(name).filter(|value| !value.is_null())
}
