//! Call guard for units of work that talk to the database.
//!
//! [`run_guarded`] runs a unit of work and, if it fails with a database
//! fault, logs the fault once and hands back the caller's sentinel instead.
//! Only [`DbError`] is absorbed; any other failure has to be converted by
//! the caller first, and panics pass straight through.

use crate::error::{DbError, DbResult, FaultClass};
use std::future::Future;
use tracing::{error, info};

/// Await `work` and return its value, or `sentinel` if it failed.
///
/// Every failure writes exactly one log record. Nothing is retried here;
/// retries belong to the connection handle.
pub async fn run_guarded<T, F, Fut>(work: F, sentinel: T) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    match work().await {
        Ok(value) => value,
        Err(err) => {
            log_fault(&err);
            sentinel
        }
    }
}

/// Synchronous variant of [`run_guarded`].
pub fn run_guarded_blocking<T, F>(work: F, sentinel: T) -> T
where
    F: FnOnce() -> DbResult<T>,
{
    match work() {
        Ok(value) => value,
        Err(err) => {
            log_fault(&err);
            sentinel
        }
    }
}

fn log_fault(err: &DbError) {
    let class = err.class();
    match class {
        // Expected while a schema migration is in flight
        FaultClass::MissingSchemaObject => {
            info!(code = ?err.code(), error = %err, "Table does not exist, using fallback");
        }
        _ if class.is_programming() => {
            error!(
                code = ?err.code(),
                class = %class,
                error = %err,
                "Programming error, using fallback"
            );
        }
        FaultClass::Unclassified => {
            error!(error = %err, "Database error, using fallback");
        }
        _ => {
            error!(
                code = ?err.code(),
                class = %class,
                error = %err,
                "Operational error, using fallback"
            );
        }
    }
}
