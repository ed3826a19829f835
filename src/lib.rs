// ============================================================================
// Hi-Fella Backend Library
// ============================================================================
//
// Events, ticketing and user accounts on top of an in-memory datastore with
// ambient transactions: a unit of work opened by `TransactionManager::run`
// is visible to every repository call made from inside it, across `.await`
// points, without passing a handle through the call chain.
//
// ============================================================================

pub mod app;
pub mod config;
pub mod connection;
pub mod core;
pub mod domain;
pub mod queue;
pub mod repository;
pub mod seed;
pub mod service;
pub mod storage;
pub mod transaction;
pub mod web;

pub use connection::{ConnectionConfig, ConnectionPool, DEFAULT_ALIAS, DataSources, PoolStats};
pub use core::{DbError, Result};
pub use repository::{Entity, Executor, Repository};
pub use storage::{Database, TableSchema};
pub use transaction::{
    Transaction, TransactionContext, TransactionManager, TransactionState, TxOptions, in_current_context,
    set_rollback_only,
};
