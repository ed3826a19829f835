use super::{ConnectionConfig, ConnectionPool};
use crate::core::{DbError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Alias of the primary relational datastore
pub const DEFAULT_ALIAS: &str = "default";

/// Registry of datastore aliases to connection pools
///
/// Built once at startup and shared by the transaction manager and every
/// repository.
#[derive(Clone, Default, Debug)]
pub struct DataSources {
    pools: Arc<BTreeMap<String, ConnectionPool>>,
}

impl DataSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool under an alias, replacing any previous registration
    pub fn with_pool(self, alias: impl Into<String>, pool: ConnectionPool) -> Self {
        let mut pools = (*self.pools).clone();
        pools.insert(alias.into(), pool);
        Self {
            pools: Arc::new(pools),
        }
    }

    /// Create and register a pool for a configuration
    pub fn with_config(self, alias: impl Into<String>, config: ConnectionConfig) -> Result<Self> {
        let pool = ConnectionPool::new(config)?;
        Ok(self.with_pool(alias, pool))
    }

    pub fn pool(&self, alias: &str) -> Result<&ConnectionPool> {
        self.pools
            .get(alias)
            .ok_or_else(|| DbError::UnknownDataSource(alias.to_string()))
    }

    pub fn default_pool(&self) -> Result<&ConnectionPool> {
        self.pool(DEFAULT_ALIAS)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.pools.contains_key(alias)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }
}
