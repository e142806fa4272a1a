//! Shared database types for Roster
//!
//! Repositories never hold ambient connection state. Each repository is
//! constructed with a [`ConnectionScope`]: either the pool (read-side
//! services) or a [`SharedTransaction`] owned by one unit of work.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use thiserror::Error;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::error::Error;

/// Database-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("{0}")]
    NotFound(String),

    #[error("Unique constraint violated: {}", .constraint.as_deref().unwrap_or("unknown"))]
    UniqueViolation { constraint: Option<String> },

    #[error("Foreign key constraint violated: {}", .constraint.as_deref().unwrap_or("unknown"))]
    ForeignKeyViolation { constraint: Option<String> },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Transaction failure: {0}")]
    Transaction(#[source] sqlx::Error),

    #[error("Transaction is no longer active")]
    TransactionClosed,

    #[error("Unit of work timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl RepositoryError {
    /// True for duplicate email / group name / membership rows.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, RepositoryError::UniqueViolation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound(_))
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().map(str::to_string);
            if db_err.is_unique_violation() {
                return RepositoryError::UniqueViolation { constraint };
            }
            if db_err.is_foreign_key_violation() {
                return RepositoryError::ForeignKeyViolation { constraint };
            }
        }
        RepositoryError::Database(err)
    }
}

impl From<RepositoryError> for Error {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => Error::NotFound(msg),
            RepositoryError::UniqueViolation { .. } | RepositoryError::ForeignKeyViolation { .. } => {
                Error::Conflict(err.to_string())
            }
            RepositoryError::InvalidData(msg) => Error::Validation(msg),
            RepositoryError::Timeout(_) => Error::Unavailable(err.to_string()),
            RepositoryError::Transaction(_) | RepositoryError::TransactionClosed => {
                Error::Internal(err.to_string())
            }
            RepositoryError::Database(e) => Error::Database(e),
        }
    }
}

/// A database transaction shared by every repository of one unit of work.
///
/// The slot is emptied on commit or rollback, after which any further use
/// reports [`RepositoryError::TransactionClosed`]. Dropping the last handle
/// of an open transaction rolls it back.
#[derive(Clone)]
pub struct SharedTransaction {
    inner: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl SharedTransaction {
    /// Begin a new transaction on the pool.
    pub async fn begin(pool: &PgPool) -> std::result::Result<Self, RepositoryError> {
        let tx = pool.begin().await.map_err(RepositoryError::Transaction)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Some(tx))),
        })
    }

    pub async fn commit(&self) -> std::result::Result<(), RepositoryError> {
        let tx = self
            .inner
            .lock()
            .await
            .take()
            .ok_or(RepositoryError::TransactionClosed)?;
        tx.commit().await.map_err(RepositoryError::Transaction)
    }

    pub async fn rollback(&self) -> std::result::Result<(), RepositoryError> {
        let tx = self
            .inner
            .lock()
            .await
            .take()
            .ok_or(RepositoryError::TransactionClosed)?;
        tx.rollback().await.map_err(RepositoryError::Transaction)
    }

    pub async fn is_active(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    /// Close the transaction without awaiting, leaving the rollback to sqlx.
    ///
    /// Every other handle sees [`RepositoryError::TransactionClosed`] from
    /// then on. A no-op once the transaction has been settled.
    pub fn abandon(&self) {
        match self.inner.try_lock() {
            Ok(mut slot) => {
                if slot.take().is_some() {
                    tracing::warn!("Open transaction abandoned, rolling back");
                }
            }
            // A statement is in flight on another handle
            Err(_) => {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let inner = Arc::clone(&self.inner);
                    handle.spawn(async move {
                        if inner.lock().await.take().is_some() {
                            tracing::warn!("Open transaction abandoned, rolling back");
                        }
                    });
                }
            }
        }
    }

    /// Guard that abandons the transaction when dropped.
    ///
    /// Holding one across a cancellable future keeps handles that escaped
    /// into spawned tasks from pinning the transaction open.
    pub fn abandon_on_drop(&self) -> AbandonOnDrop {
        AbandonOnDrop { tx: self.clone() }
    }

    async fn connection(
        &self,
    ) -> std::result::Result<MappedMutexGuard<'_, PgConnection>, RepositoryError> {
        let guard = self.inner.lock().await;
        MutexGuard::try_map(guard, |slot| slot.as_deref_mut())
            .map_err(|_| RepositoryError::TransactionClosed)
    }
}

/// See [`SharedTransaction::abandon_on_drop`].
#[must_use = "the transaction is abandoned as soon as the guard is dropped"]
pub struct AbandonOnDrop {
    tx: SharedTransaction,
}

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.tx.abandon();
    }
}

/// Where a repository sends its statements.
#[derive(Clone)]
pub enum ConnectionScope {
    /// Autocommit statements on a pooled connection
    Pool(PgPool),
    /// Statements inside a unit of work's transaction
    Transaction(SharedTransaction),
}

impl ConnectionScope {
    /// Acquire the connection for the next statement.
    ///
    /// A transaction scope holds its lock until the returned guard is
    /// dropped, so statements of one unit of work never interleave.
    pub async fn acquire(&self) -> std::result::Result<ScopedConnection<'_>, RepositoryError> {
        match self {
            ConnectionScope::Pool(pool) => Ok(ScopedConnection::Pooled(pool.acquire().await?)),
            ConnectionScope::Transaction(tx) => {
                Ok(ScopedConnection::Transaction(tx.connection().await?))
            }
        }
    }
}

impl From<PgPool> for ConnectionScope {
    fn from(pool: PgPool) -> Self {
        ConnectionScope::Pool(pool)
    }
}

impl From<SharedTransaction> for ConnectionScope {
    fn from(tx: SharedTransaction) -> Self {
        ConnectionScope::Transaction(tx)
    }
}

/// Connection borrowed from a [`ConnectionScope`].
pub enum ScopedConnection<'a> {
    Pooled(PoolConnection<Postgres>),
    Transaction(MappedMutexGuard<'a, PgConnection>),
}

impl Deref for ScopedConnection<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        match self {
            ScopedConnection::Pooled(conn) => &**conn,
            ScopedConnection::Transaction(conn) => &**conn,
        }
    }
}

impl DerefMut for ScopedConnection<'_> {
    fn deref_mut(&mut self) -> &mut PgConnection {
        match self {
            ScopedConnection::Pooled(conn) => &mut **conn,
            ScopedConnection::Transaction(conn) => &mut **conn,
        }
    }
}
