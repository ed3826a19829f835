use crate::core::Record;
use std::collections::BTreeMap;

/// Address of one row: table name plus primary key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey {
    pub table: String,
    pub id: String,
}

impl RowKey {
    pub fn new(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id: id.into(),
        }
    }
}

/// A buffered change to a single row
///
/// `base_version` is the committed version observed when the transaction
/// first touched the row (`None` when the row did not exist). A `None`
/// value is a delete.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub base_version: Option<u64>,
    pub value: Option<Record>,
}

pub type WriteSet = BTreeMap<RowKey, PendingWrite>;
