/*!
 * Unit of work and operation scope
 *
 * Every mutating or multi-read operation runs inside exactly one transaction.
 * The transaction commits only when the operation body returns `Ok`; any error,
 * including cancellation observed through an [`OperationScope`], rolls it back.
 */

use crate::errors::ServiceError;
use metrics::{counter, histogram};
use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    IsolationLevel, TransactionTrait,
};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Cancellation signal and optional deadline carried by a single operation.
///
/// Cloning shares the underlying token, so a caller can keep a clone and
/// cancel an operation that is already in flight.
#[derive(Debug, Clone, Default)]
pub struct OperationScope {
    token: CancellationToken,
    deadline: Option<tokio::time::Instant>,
}

impl OperationScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(tokio::time::Instant::now() + timeout);
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Reason the operation must stop, if any.
    pub fn interrupted(&self) -> Option<&'static str> {
        if self.token.is_cancelled() {
            return Some("operation cancelled");
        }
        match self.deadline {
            Some(deadline) if tokio::time::Instant::now() >= deadline => {
                Some("operation deadline exceeded")
            }
            _ => None,
        }
    }

    /// Fails fast with `Cancelled` when the scope was already interrupted.
    pub fn check(&self) -> Result<(), ServiceError> {
        match self.interrupted() {
            Some(reason) => Err(ServiceError::Cancelled(reason.to_string())),
            None => Ok(()),
        }
    }

    /// Drives `fut` until it completes or the scope is interrupted.
    ///
    /// On interruption the future is dropped mid-flight and `Cancelled` is returned.
    /// A result that arrives after the scope was interrupted is discarded as well.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                Err(ServiceError::Cancelled("operation cancelled".to_string()))
            }
            _ = deadline => {
                Err(ServiceError::Cancelled("operation deadline exceeded".to_string()))
            }
            res = fut => res,
        };

        let value = result?;
        self.check()?;
        Ok(value)
    }
}

/// A single open transaction tied to a named operation.
pub struct UnitOfWork {
    txn: DatabaseTransaction,
    operation: &'static str,
    id: Uuid,
    started: Instant,
}

impl UnitOfWork {
    /// Opens a read-write transaction.
    pub async fn begin(
        db: &DatabaseConnection,
        operation: &'static str,
    ) -> Result<Self, ServiceError> {
        let txn = db
            .begin()
            .await
            .map_err(|e| ServiceError::db_error(operation, e))?;
        Ok(Self::started(txn, operation))
    }

    /// Opens a transaction whose reads all observe one consistent snapshot.
    ///
    /// On Postgres this is a read-only REPEATABLE READ transaction. SQLite
    /// serializes writers, so a plain transaction already sees a stable view.
    pub async fn begin_snapshot(
        db: &DatabaseConnection,
        operation: &'static str,
    ) -> Result<Self, ServiceError> {
        let txn = match db.get_database_backend() {
            DbBackend::Postgres => {
                db.begin_with_config(
                    Some(IsolationLevel::RepeatableRead),
                    Some(AccessMode::ReadOnly),
                )
                .await
            }
            _ => db.begin().await,
        }
        .map_err(|e| ServiceError::db_error(operation, e))?;
        Ok(Self::started(txn, operation))
    }

    fn started(txn: DatabaseTransaction, operation: &'static str) -> Self {
        let id = Uuid::new_v4();
        debug!(transaction_id = %id, operation, "Starting database transaction");
        counter!("boq_db.transaction.started", 1);
        Self {
            txn,
            operation,
            id,
            started: Instant::now(),
        }
    }

    pub fn txn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Commits on `Ok`, rolls back on `Err`, and hands the result back.
    pub async fn finish<T>(self, result: Result<T, ServiceError>) -> Result<T, ServiceError> {
        let Self {
            txn,
            operation,
            id,
            started,
        } = self;

        match result {
            Ok(value) => {
                txn.commit()
                    .await
                    .map_err(|e| ServiceError::db_error(operation, e))?;
                let elapsed = started.elapsed();
                histogram!("boq_db.transaction.duration", elapsed);
                counter!("boq_db.transaction.committed", 1);
                debug!(transaction_id = %id, operation, "Transaction committed in {:?}", elapsed);
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(
                        transaction_id = %id,
                        operation,
                        error = %rollback_err,
                        "Rollback failed; connection will discard the transaction"
                    );
                }
                counter!("boq_db.transaction.rolled_back", 1);
                warn!(
                    transaction_id = %id,
                    operation,
                    error = %err,
                    "Transaction rolled back after {:?}",
                    started.elapsed()
                );
                Err(err)
            }
        }
    }
}
