use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::{Backend, Result, StoreError, TxContext};

/// Transaction lifecycle shared by every write handler.
///
/// A transaction either commits every write issued through its
/// [`TxContext`] or none of them. Callers normally go through
/// [`UnitOfWork::execute_in_transaction`], which rolls back on any error
/// returned by the operation.
#[derive(Clone)]
pub struct UnitOfWork {
    backend: Arc<dyn Backend>,
}

impl UnitOfWork {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The backend transactions are opened against.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Opens a transaction.
    pub async fn start_transaction(&self) -> Result<TxContext> {
        let ctx = self.backend.begin().await.inspect_err(|e| {
            tracing::warn!(error = %e, "could not start transaction");
        })?;
        tracing::debug!(tx = %ctx.id(), "transaction started");
        Ok(ctx)
    }

    /// Commits a transaction. On failure nothing issued against `ctx` persists.
    #[tracing::instrument(skip(self, ctx), fields(tx = %ctx.id()))]
    pub async fn commit_transaction(&self, ctx: TxContext) -> Result<()> {
        let writes = ctx.pending_writes();
        match self.backend.commit(ctx).await {
            Ok(()) => {
                metrics::counter!("uow_commits_total").increment(1);
                tracing::debug!(writes, "transaction committed");
                Ok(())
            }
            Err(e) => {
                metrics::counter!("uow_commit_failures_total").increment(1);
                tracing::warn!(error = %e, "transaction commit failed");
                Err(e)
            }
        }
    }

    /// Rolls back a transaction. Never fails; backend errors are logged.
    #[tracing::instrument(skip(self, ctx), fields(tx = %ctx.id()))]
    pub async fn rollback_transaction(&self, ctx: TxContext) {
        metrics::counter!("uow_rollbacks_total").increment(1);
        if let Err(e) = self.backend.rollback(ctx).await {
            tracing::error!(error = %e, "rollback failed");
        } else {
            tracing::debug!("transaction rolled back");
        }
    }

    /// Runs `op` inside a fresh transaction.
    ///
    /// Commits when `op` returns `Ok`, rolls back when it returns `Err`.
    /// Commit failures surface as `E::from(StoreError)`; the operation's own
    /// error is returned unchanged.
    pub async fn execute_in_transaction<T, E, F>(&self, op: F) -> std::result::Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut TxContext) -> BoxFuture<'c, std::result::Result<T, E>> + Send,
        T: Send,
        E: From<StoreError> + Send,
    {
        let mut ctx = self.start_transaction().await?;
        match op(&mut ctx).await {
            Ok(value) => {
                self.commit_transaction(ctx).await?;
                Ok(value)
            }
            Err(e) => {
                self.rollback_transaction(ctx).await;
                Err(e)
            }
        }
    }

    /// Like [`UnitOfWork::execute_in_transaction`], but rolls back and fails with
    /// [`StoreError::DeadlineExceeded`] if `op` has not finished within `deadline`.
    pub async fn execute_with_deadline<T, E, F>(
        &self,
        deadline: Duration,
        op: F,
    ) -> std::result::Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut TxContext) -> BoxFuture<'c, std::result::Result<T, E>> + Send,
        T: Send,
        E: From<StoreError> + Send,
    {
        let mut ctx = self.start_transaction().await?;
        let tx = ctx.id();
        match tokio::time::timeout(deadline, op(&mut ctx)).await {
            Ok(Ok(value)) => {
                self.commit_transaction(ctx).await?;
                Ok(value)
            }
            Ok(Err(e)) => {
                self.rollback_transaction(ctx).await;
                Err(e)
            }
            Err(_) => {
                tracing::warn!(%tx, ?deadline, "transaction deadline exceeded");
                self.rollback_transaction(ctx).await;
                Err(StoreError::DeadlineExceeded { tx, deadline }.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{Collection, CommitError, EntityId, InMemoryBackend, TransactionStartError};

    const ITEMS: Collection = Collection::new("items");

    #[derive(Debug, thiserror::Error)]
    enum OpError {
        #[error("business rule violated")]
        Rule,
        #[error(transparent)]
        Store(#[from] StoreError),
    }

    fn setup() -> (Arc<InMemoryBackend>, UnitOfWork) {
        let backend = Arc::new(InMemoryBackend::new());
        let uow = UnitOfWork::new(backend.clone());
        (backend, uow)
    }

    #[tokio::test]
    async fn commits_on_success() {
        let (backend, uow) = setup();
        let b = backend.clone();
        let version = uow
            .execute_in_transaction(move |ctx| {
                Box::pin(async move {
                    b.insert(ctx, ITEMS, &EntityId::new("a"), json!({"n": 1}))
                        .await
                })
            })
            .await
            .unwrap();

        assert_eq!(version.as_i64(), 1);
        assert!(backend.get(ITEMS, &EntityId::new("a")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rolls_back_every_write_on_error() {
        let (backend, uow) = setup();
        let b = backend.clone();
        let result: std::result::Result<(), OpError> = uow
            .execute_in_transaction(move |ctx| {
                Box::pin(async move {
                    b.insert(ctx, ITEMS, &EntityId::new("a"), json!({})).await?;
                    b.insert(ctx, ITEMS, &EntityId::new("b"), json!({})).await?;
                    Err(OpError::Rule)
                })
            })
            .await;

        assert!(matches!(result, Err(OpError::Rule)));
        assert_eq!(backend.count(ITEMS).await, 0);
    }

    #[tokio::test]
    async fn commit_failure_is_reported_and_nothing_persists() {
        let (backend, uow) = setup();
        backend.fail_next_commit();
        let b = backend.clone();
        let result: std::result::Result<(), OpError> = uow
            .execute_in_transaction(move |ctx| {
                Box::pin(async move {
                    b.insert(ctx, ITEMS, &EntityId::new("a"), json!({})).await?;
                    Ok(())
                })
            })
            .await;

        assert!(matches!(
            result,
            Err(OpError::Store(StoreError::Commit {
                cause: CommitError::Rejected(_),
                ..
            }))
        ));
        assert_eq!(backend.count(ITEMS).await, 0);
    }

    #[tokio::test]
    async fn start_failure_skips_the_operation() {
        let backend = Arc::new(InMemoryBackend::new().with_max_open_transactions(1));
        let uow = UnitOfWork::new(backend.clone());
        let _held = uow.start_transaction().await.unwrap();

        let result: std::result::Result<(), StoreError> = uow
            .execute_in_transaction(|_ctx| {
                Box::pin(async { Err(StoreError::Backend("ran".into())) })
            })
            .await;
        assert!(matches!(
            result,
            Err(StoreError::TransactionStart(
                TransactionStartError::Exhausted { limit: 1 }
            ))
        ));
    }

    #[tokio::test]
    async fn unavailable_backend_fails_start() {
        let (backend, uow) = setup();
        backend.set_fail_on_begin(true);
        let err = uow.start_transaction().await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::TransactionStart(TransactionStartError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn explicit_rollback_releases_the_slot() {
        let backend = Arc::new(InMemoryBackend::new().with_max_open_transactions(1));
        let uow = UnitOfWork::new(backend.clone());
        let mut ctx = uow.start_transaction().await.unwrap();
        backend
            .insert(&mut ctx, ITEMS, &EntityId::new("a"), json!({}))
            .await
            .unwrap();
        uow.rollback_transaction(ctx).await;

        let ctx = uow.start_transaction().await.unwrap();
        uow.commit_transaction(ctx).await.unwrap();
        assert_eq!(backend.count(ITEMS).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_rolls_back_slow_operations() {
        let (backend, uow) = setup();
        let b = backend.clone();
        let result: std::result::Result<(), StoreError> = uow
            .execute_with_deadline(Duration::from_millis(50), move |ctx| {
                Box::pin(async move {
                    b.insert(ctx, ITEMS, &EntityId::new("a"), json!({})).await?;
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok(())
                })
            })
            .await;

        assert!(matches!(result, Err(StoreError::DeadlineExceeded { .. })));
        assert_eq!(backend.count(ITEMS).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_allows_fast_operations() {
        let (backend, uow) = setup();
        let b = backend.clone();
        uow.execute_with_deadline(Duration::from_millis(50), move |ctx| {
            Box::pin(async move {
                b.insert(ctx, ITEMS, &EntityId::new("a"), json!({})).await?;
                Ok::<_, StoreError>(())
            })
        })
        .await
        .unwrap();
        assert_eq!(backend.count(ITEMS).await, 1);
    }
}
