// ============================================================================
// Transaction Manager
// ============================================================================
//
// Turns a plain async operation into one that runs atomically per declared
// datastore. The outermost invocation opens one transaction per alias,
// binds a fresh `TransactionContext` and finishes every handle it opened.
// Nested invocations inside the same call chain reuse the handles already
// in the context and only open (and later finish) aliases that are missing.
//
// Stores are committed one after another. There is no two-phase commit:
// if a later store fails to commit, earlier stores stay committed.
//
// ============================================================================

use super::{Transaction, TransactionContext, TxOptions};
use crate::connection::DataSources;
use crate::core::{DbError, Result as DbResult};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Clone, Debug)]
pub struct TransactionManager {
    sources: DataSources,
}

impl TransactionManager {
    pub fn new(sources: DataSources) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &DataSources {
        &self.sources
    }

    /// Run `operation` inside a transaction on the primary datastore
    pub async fn run_default<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        self.run(&TxOptions::default(), operation).await
    }

    /// Run `operation` atomically across the datastores named in `options`
    ///
    /// * `Ok` without rollback-only: every handle opened here is committed in
    ///   opening order. A failing commit rolls back the handles not yet
    ///   committed and its error is returned.
    /// * `Ok` with rollback-only: every handle opened here is rolled back and
    ///   the value is returned.
    /// * `Err`: every handle opened here is rolled back and the error is
    ///   returned unchanged.
    /// * Cancelled (future dropped) or panicked: handles opened here are
    ///   rolled back when the future is dropped.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use hifella::{DataSources, TransactionManager, TxOptions, DbError};
    /// # async fn demo(sources: DataSources) -> Result<(), DbError> {
    /// let manager = TransactionManager::new(sources);
    /// manager
    ///     .run(&TxOptions::default(), || async {
    ///         // repositories resolve the ambient transaction here
    ///         Ok::<_, DbError>(())
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run<F, Fut, T, E>(&self, options: &TxOptions, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        match TransactionContext::current() {
            Some(context) => self.run_nested(context, options, operation).await,
            None => self.run_root(options, operation).await,
        }
    }

    async fn run_root<F, Fut, T, E>(&self, options: &TxOptions, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        let context = Arc::new(TransactionContext::new());
        let mut unit = UnitOfWork::new(Arc::clone(&context));
        if let Err(err) = unit.open(&self.sources, options).await {
            unit.rollback_all().await;
            return Err(E::from(err));
        }

        debug!(aliases = ?options.aliases(), "transactional operation started");
        let result = TransactionContext::scope(context, async move { operation().await }).await;
        unit.finish(result).await
    }

    async fn run_nested<F, Fut, T, E>(
        &self,
        context: Arc<TransactionContext>,
        options: &TxOptions,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        let mut unit = UnitOfWork::new(Arc::clone(&context));
        if let Err(err) = unit.open(&self.sources, options).await {
            unit.rollback_all().await;
            return Err(E::from(err));
        }

        let reuses_outer = unit.owned.len() < options.aliases().len();
        debug!(
            aliases = ?options.aliases(),
            opened = unit.owned.len(),
            "joined enclosing transactional operation"
        );

        let result = operation().await;
        if result.is_err() && reuses_outer {
            // Partial work on shared handles must not be committed by the
            // enclosing operation.
            context.mark_rollback_only();
        }
        unit.finish(result).await
    }
}

/// Handles opened by one invocation of the transactional wrapper
///
/// Dropping an unfinished unit rolls back everything it opened.
struct UnitOfWork {
    context: Arc<TransactionContext>,
    owned: Vec<(String, Arc<Transaction>)>,
    finished: bool,
}

impl UnitOfWork {
    fn new(context: Arc<TransactionContext>) -> Self {
        Self {
            context,
            owned: Vec::new(),
            finished: false,
        }
    }

    /// Open a transaction for every alias the context does not have yet
    async fn open(&mut self, sources: &DataSources, options: &TxOptions) -> DbResult<()> {
        for alias in options.aliases() {
            if self.context.contains(alias) {
                continue;
            }

            let pool = sources.pool(alias)?;
            let tx = Arc::new(pool.begin().await?);
            self.context.register(alias, Arc::clone(&tx));
            self.owned.push((alias.clone(), tx));
        }
        Ok(())
    }

    async fn finish<T, E>(mut self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        match result {
            Ok(value) if !self.context.is_rollback_only() => {
                self.commit_all().await.map_err(E::from)?;
                Ok(value)
            }
            Ok(value) => {
                debug!("rollback-only operation finished, rolling back");
                self.rollback_all().await;
                Ok(value)
            }
            Err(err) => {
                self.rollback_all().await;
                Err(err)
            }
        }
    }

    async fn commit_all(&mut self) -> DbResult<()> {
        let owned = std::mem::take(&mut self.owned);

        for (index, (alias, tx)) in owned.iter().enumerate() {
            if let Err(err) = tx.commit().await {
                error!(
                    alias = %alias,
                    committed = index,
                    error = %err,
                    "commit failed; earlier datastores stay committed"
                );
                for (remaining_alias, remaining) in &owned[index + 1..] {
                    if let Err(rollback_err) = remaining.rollback().await {
                        warn!(alias = %remaining_alias, error = %rollback_err, "rollback after failed commit failed");
                    }
                }
                self.release(&owned);
                return Err(err);
            }
        }

        self.release(&owned);
        Ok(())
    }

    async fn rollback_all(&mut self) {
        let owned = std::mem::take(&mut self.owned);

        for (alias, tx) in &owned {
            if let Err(err) = tx.rollback().await {
                warn!(alias = %alias, error = %err, "rollback failed");
            }
        }

        self.release(&owned);
    }

    fn release(&mut self, owned: &[(String, Arc<Transaction>)]) {
        for (alias, _) in owned {
            self.context.unregister(alias);
        }
        self.finished = true;
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.finished || self.owned.is_empty() {
            return;
        }

        warn!(
            aliases = ?self.owned.iter().map(|(alias, _)| alias.as_str()).collect::<Vec<_>>(),
            "transactional operation cancelled, rolling back"
        );
        self.context.mark_rollback_only();
        for (alias, tx) in self.owned.drain(..) {
            tx.abort();
            self.context.unregister(&alias);
        }
    }
}
