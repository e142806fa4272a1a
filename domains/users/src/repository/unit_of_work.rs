//! Unit of work: one transaction around a caller-supplied block of
//! repository calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use roster_common::{RepositoryError, SharedTransaction};
use sqlx::PgPool;

use super::{PgGroupRepository, PgUserRepository, RepositoryContext};

/// Runs `work` atomically against a fresh [`RepositoryContext`].
///
/// `Ok` commits and returns the value. `Err` rolls back and returns the
/// error exactly as `work` produced it. Failures of the transaction itself
/// (begin, commit) reach the caller through `E: From<RepositoryError>`.
///
/// Calling `execute` again from inside `work` against the same store is not
/// supported.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn execute<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(RepositoryContext) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: From<RepositoryError> + Send;
}

/// PostgreSQL unit of work
#[derive(Clone)]
pub struct PgUnitOfWork {
    pool: PgPool,
    timeout: Option<Duration>,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: None,
        }
    }

    /// Abort and roll back any invocation whose work outlives `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn execute<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(RepositoryContext) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: From<RepositoryError> + Send,
    {
        let tx = SharedTransaction::begin(&self.pool).await?;
        // Fires only if this future is dropped before settling; after
        // settle the slot is already empty.
        let _abandon = tx.abandon_on_drop();
        tracing::debug!("Unit of work started");

        let ctx = RepositoryContext::new(
            Arc::new(PgUserRepository::new(tx.clone())),
            Arc::new(PgGroupRepository::new(tx.clone())),
        );

        // The work future, and with it every lock it holds on the
        // transaction, is dropped before settling.
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, work(ctx)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(timeout = ?limit, "Unit of work timed out");
                    Err(RepositoryError::Timeout(limit).into())
                }
            },
            None => work(ctx).await,
        };

        settle(&tx, outcome).await
    }
}

async fn settle<T, E>(tx: &SharedTransaction, outcome: Result<T, E>) -> Result<T, E>
where
    E: From<RepositoryError>,
{
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to commit unit of work");
                e
            })?;
            tracing::debug!("Unit of work committed");
            Ok(value)
        }
        Err(err) => {
            match tx.rollback().await {
                Ok(()) => tracing::warn!("Unit of work failed, transaction rolled back"),
                // The original error wins; the connection is discarded by sqlx.
                Err(rollback_err) => {
                    tracing::error!(error = %rollback_err, "Failed to roll back unit of work")
                }
            }
            Err(err)
        }
    }
}
