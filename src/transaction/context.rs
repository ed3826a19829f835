// ============================================================================
// Transaction Context Store
// ============================================================================
//
// The ambient, per-call-chain slot holding the open transaction handles of
// one unit of work. It is bound with a tokio task-local, so it survives
// every `.await` inside the bound future and never leaks into other tasks.
// Futures handed to `tokio::spawn` start without a context unless they are
// wrapped with `in_current_context`.
//
// ============================================================================

use super::Transaction;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

tokio::task_local! {
    static CURRENT: Arc<TransactionContext>;
}

/// Open transaction handles of one unit of work, keyed by datastore alias
/// in the order they were opened, plus the rollback-only flag.
#[derive(Default)]
pub struct TransactionContext {
    handles: Mutex<Vec<(String, Arc<Transaction>)>>,
    rollback_only: AtomicBool,
}

impl TransactionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The context bound to the calling task, if any
    pub fn current() -> Option<Arc<TransactionContext>> {
        CURRENT.try_with(Arc::clone).ok()
    }

    /// Run `fut` with `context` bound as the current context
    ///
    /// A nested `scope` shadows the outer context only for its own extent.
    pub async fn scope<F>(context: Arc<TransactionContext>, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(context, fut).await
    }

    /// The active handle registered for `alias`
    pub fn handle(&self, alias: &str) -> Option<Arc<Transaction>> {
        self.lock_handles()
            .iter()
            .find(|(name, tx)| name == alias && tx.is_active())
            .map(|(_, tx)| Arc::clone(tx))
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.lock_handles().iter().any(|(name, _)| name == alias)
    }

    /// Registered aliases in opening order
    pub fn aliases(&self) -> Vec<String> {
        self.lock_handles().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_handles().is_empty()
    }

    pub(crate) fn register(&self, alias: &str, tx: Arc<Transaction>) {
        self.lock_handles().push((alias.to_string(), tx));
    }

    pub(crate) fn unregister(&self, alias: &str) {
        self.lock_handles().retain(|(name, _)| name != alias);
    }

    /// Force the unit of work to roll back even if it returns successfully
    pub fn mark_rollback_only(&self) {
        self.rollback_only.store(true, Ordering::SeqCst);
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only.load(Ordering::SeqCst)
    }

    // Handle bookkeeping never panics while holding the lock, so a poisoned
    // mutex still holds a consistent list.
    fn lock_handles(&self) -> MutexGuard<'_, Vec<(String, Arc<Transaction>)>> {
        match self.handles.lock() {
            Ok(handles) => handles,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("aliases", &self.aliases())
            .field("rollback_only", &self.is_rollback_only())
            .finish()
    }
}

/// Mark the current unit of work rollback-only
///
/// Returns `false` (and does nothing) outside a transactional operation.
pub fn set_rollback_only() -> bool {
    match TransactionContext::current() {
        Some(context) => {
            context.mark_rollback_only();
            true
        }
        None => false,
    }
}

/// Carry the caller's context into a future that will run on another task
///
/// ```no_run
/// # async fn demo() {
/// use hifella::transaction::in_current_context;
///
/// let handle = tokio::spawn(in_current_context(async {
///     // repositories here resolve the caller's transaction handles
/// }));
/// handle.await.unwrap();
/// # }
/// ```
pub fn in_current_context<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let context = TransactionContext::current();
    async move {
        match context {
            Some(context) => CURRENT.scope(context, fut).await,
            None => fut.await,
        }
    }
}
