//! Task-scoped, reentrant transactions.
//!
//! The outermost [`crate::db::Database::transaction`] call on a database
//! begins a transaction and makes it visible to everything awaited inside it
//! through a task-local list of active scopes. Nested calls on the same
//! database find the scope and only bump its depth; all statements issued
//! while a scope is active run on its transaction.
//!
//! A scope that returns an error rolls the whole transaction back at once.
//! The scope stays registered until the outermost call returns, so later
//! statements in it fail with `TransactionAborted` instead of silently
//! running in autocommit mode.

use crate::error::{DbError, DbResult};
use sqlx::{Sqlite, Transaction};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info, warn};

tokio::task_local! {
    static ACTIVE_SCOPES: ActiveScopes;
}

/// Scopes active in the current task, one per database.
#[derive(Clone, Default)]
struct ActiveScopes(Vec<Arc<TransactionScope>>);

impl ActiveScopes {
    fn current() -> Self {
        ACTIVE_SCOPES.try_with(Clone::clone).unwrap_or_default()
    }

    fn with(mut self, scope: Arc<TransactionScope>) -> Self {
        self.0.push(scope);
        self
    }
}

/// The active scope for a database in the current task, if any.
pub(crate) fn active_scope(database_id: u64) -> Option<Arc<TransactionScope>> {
    ACTIVE_SCOPES
        .try_with(|scopes| {
            scopes
                .0
                .iter()
                .find(|s| s.database_id == database_id)
                .cloned()
        })
        .ok()
        .flatten()
}

pub(crate) struct TransactionScope {
    database_id: u64,
    transaction_id: String,
    /// `None` once the transaction has been committed or rolled back.
    transaction: Mutex<Option<Transaction<'static, Sqlite>>>,
    depth: AtomicUsize,
    started_at: Instant,
}

/// Decrements the scope depth when a nested call ends, including on panic
/// or cancellation.
struct DepthGuard<'a>(&'a AtomicUsize);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TransactionScope {
    fn new(database_id: u64, transaction: Transaction<'static, Sqlite>) -> Self {
        Self {
            database_id,
            transaction_id: generate_transaction_id(),
            transaction: Mutex::new(Some(transaction)),
            depth: AtomicUsize::new(1),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Lock the open transaction for one statement.
    pub(crate) async fn lock(&self) -> DbResult<MappedMutexGuard<'_, Transaction<'static, Sqlite>>> {
        MutexGuard::try_map(self.transaction.lock().await, Option::as_mut)
            .map_err(|_| self.aborted_error())
    }

    fn aborted_error(&self) -> DbError {
        DbError::transaction_aborted(
            "an enclosing scope failed and the transaction was rolled back",
            &self.transaction_id,
        )
    }

    /// Run `f` as an outermost scope: begin, then commit or roll back.
    pub(crate) async fn run_outermost<F, Fut, T, E>(
        database_id: u64,
        transaction: Transaction<'static, Sqlite>,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        let scope = Arc::new(Self::new(database_id, transaction));
        info!(transaction_id = %scope.transaction_id, "Transaction started");

        let scopes = ActiveScopes::current().with(Arc::clone(&scope));
        let result = ACTIVE_SCOPES.scope(scopes, f()).await;
        scope.finish(result).await
    }

    /// Run `f` inside this already active scope.
    pub(crate) async fn run_nested<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = DepthGuard(&self.depth);
        debug!(transaction_id = %self.transaction_id, depth, "Entering nested scope");

        let result = f().await;
        if result.is_err() {
            self.rollback("nested scope failed").await;
        }
        result
    }

    async fn finish<T, E>(&self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let transaction = self.transaction.lock().await.take();
        let elapsed_ms = self.started_at.elapsed().as_millis() as u64;

        match (result, transaction) {
            (Ok(value), Some(tx)) => {
                tx.commit().await.map_err(DbError::from)?;
                info!(
                    transaction_id = %self.transaction_id,
                    elapsed_ms,
                    "Transaction committed"
                );
                Ok(value)
            }
            (Ok(_), None) => Err(self.aborted_error().into()),
            (Err(err), Some(tx)) => {
                match tx.rollback().await {
                    Ok(()) => info!(
                        transaction_id = %self.transaction_id,
                        elapsed_ms,
                        "Transaction rolled back"
                    ),
                    Err(e) => warn!(
                        transaction_id = %self.transaction_id,
                        error = %e,
                        "Failed to roll back transaction"
                    ),
                }
                Err(err)
            }
            (Err(err), None) => Err(err),
        }
    }

    /// Roll back now, leaving the scope aborted.
    async fn rollback(&self, reason: &str) {
        let Some(tx) = self.transaction.lock().await.take() else {
            return;
        };
        match tx.rollback().await {
            Ok(()) => info!(
                transaction_id = %self.transaction_id,
                reason,
                "Transaction rolled back"
            ),
            Err(e) => warn!(
                transaction_id = %self.transaction_id,
                reason,
                error = %e,
                "Failed to roll back transaction"
            ),
        }
    }
}

fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_id_format() {
        let id = generate_transaction_id();
        assert!(id.starts_with("tx_"));
        assert_eq!(id.len(), 3 + 32);
    }

    #[test]
    fn test_no_scope_outside_task_local() {
        assert!(active_scope(1).is_none());
    }

    #[test]
    fn test_depth_guard_decrements() {
        let depth = AtomicUsize::new(2);
        {
            let _guard = DepthGuard(&depth);
        }
        assert_eq!(depth.load(Ordering::SeqCst), 1);
    }
}
