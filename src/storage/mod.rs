pub mod memory;
pub mod table;
pub mod write_set;

pub use memory::Database;
pub use table::{Table, TableSchema};
pub use write_set::{PendingWrite, RowKey, WriteSet};
