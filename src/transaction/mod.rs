// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Ambient, multi-datastore transactions:
// - Transaction: one open handle on one datastore (buffered write set,
//   first-committer-wins conflict detection)
// - TransactionContext: task-local slot with the handles of the current
//   unit of work
// - TransactionManager: wraps an async operation so it commits or rolls
//   back atomically per declared datastore
//
// ============================================================================

pub mod context;
pub mod handle;
pub mod manager;
pub mod options;
pub mod state;

pub use context::{TransactionContext, in_current_context, set_rollback_only};
pub use handle::Transaction;
pub use manager::TransactionManager;
pub use options::TxOptions;
pub use state::{TransactionId, TransactionState};
