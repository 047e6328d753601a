//! Connection handle for one named database.
//!
//! A [`Database`] owns at most one live driver connection. It connects
//! lazily on the first query, reconnects once when the connection turns out
//! to be dead, and falls back to the [`RetryPolicy`] loop when the server
//! drops the statement again right after reconnecting.

use crate::db::driver::{Cursor, Driver, DriverConnection, DriverFault};
use crate::db::retry::{RetryPolicy, execute_with_retry};
use crate::error::{DbError, DbResult, FaultClass};
use crate::models::{ConnectParams, QueryParam};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Cursor type produced by a driver.
pub type CursorOf<D> = <<D as Driver>::Connection as DriverConnection>::Cursor;

pub struct Database<D: Driver> {
    driver: D,
    params: ConnectParams,
    retry_policy: RetryPolicy,
    /// Held for the whole of `connect`/`query`, which serializes callers.
    conn: Mutex<Option<D::Connection>>,
}

impl<D: Driver> Database<D> {
    /// Create a handle. Nothing is opened until the first query or `connect`.
    pub fn new(driver: D, params: ConnectParams) -> Self {
        Self {
            driver,
            params,
            retry_policy: RetryPolicy::default(),
            conn: Mutex::new(None),
        }
    }

    /// Replace the retry policy used after a reconnect.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Database identifier.
    pub fn name(&self) -> &str {
        &self.params.database
    }

    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Whether a connection is currently held.
    ///
    /// A held connection may still be dead; that is only discovered by using it.
    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Open a connection, replacing any previous one without closing it.
    ///
    /// Failures are logged and otherwise swallowed: the slot keeps its
    /// previous content, and an empty slot is the only observable result.
    pub async fn connect(&self) {
        let mut slot = self.conn.lock().await;
        self.connect_into(&mut slot).await;
    }

    /// Execute `sql` and return the cursor holding its outcome.
    pub async fn query(&self, sql: &str, params: &[QueryParam]) -> DbResult<CursorOf<D>> {
        let mut slot = self.conn.lock().await;

        if slot.is_none() {
            debug!(database = %self.name(), "Connecting, no connection established yet");
            self.connect_into(&mut slot).await;
        }

        let Some(conn) = slot.as_ref() else {
            return Err(DbError::connection_lost(format!(
                "No live connection to database '{}'",
                self.name()
            )));
        };

        let fault = match conn.cursor() {
            Ok(mut cursor) => match cursor.execute(sql, params).await {
                Ok(()) => return Ok(cursor),
                Err(fault) => fault,
            },
            Err(fault) => fault,
        };

        let err = DbError::from(fault);
        let class = err.class();
        match class {
            _ if class.triggers_reconnect() => {
                warn!(
                    database = %self.name(),
                    class = %class,
                    error = %err,
                    "Execution failed on a lost connection, reconnecting"
                );
                self.reconnect_and_execute(&mut slot, sql, params, err).await
            }
            FaultClass::Syntax => {
                debug!(database = %self.name(), sql = %sql, error = %err, "Execution failed");
                Err(err)
            }
            _ if class.is_programming() => {
                error!(
                    database = %self.name(),
                    code = ?err.code(),
                    error = %err,
                    "Execution failed"
                );
                Err(err)
            }
            _ => Err(err),
        }
    }

    /// Close the held connection, if any.
    ///
    /// Returns whether a connection was held. The closed connection stays in
    /// the slot; using it afterwards fails as a lost connection and triggers
    /// a reconnect.
    pub(crate) async fn close(&self) -> Result<bool, DriverFault> {
        let slot = self.conn.lock().await;
        match slot.as_ref() {
            Some(conn) => conn.close().await.map(|()| true),
            None => Ok(false),
        }
    }

    /// Returns whether a new connection was stored.
    async fn connect_into(&self, slot: &mut Option<D::Connection>) -> bool {
        match self.driver.connect(&self.params).await {
            Ok(conn) => {
                if slot.replace(conn).is_some() {
                    info!(database = %self.name(), "Reconnected, previous connection abandoned");
                } else {
                    info!(database = %self.name(), host = %self.params.host, "Connected");
                }
                true
            }
            Err(fault) => {
                error!(
                    database = %self.name(),
                    target = %self.params.masked_url(),
                    code = ?fault.code(),
                    error = %fault,
                    "Can't establish connection"
                );
                false
            }
        }
    }

    /// Reconnect once and re-execute once; on a second server-lost fault,
    /// hand over to the retry loop on the new cursor.
    async fn reconnect_and_execute(
        &self,
        slot: &mut Option<D::Connection>,
        sql: &str,
        params: &[QueryParam],
        original: DbError,
    ) -> DbResult<CursorOf<D>> {
        if !self.connect_into(slot).await {
            return Err(original);
        }
        let Some(conn) = slot.as_ref() else {
            return Err(original);
        };

        let mut cursor = conn.cursor().map_err(|fault| {
            let err = DbError::from(fault);
            error!(database = %self.name(), error = %err, "No cursor after reconnecting");
            err
        })?;

        match cursor.execute(sql, params).await {
            Ok(()) => Ok(cursor),
            Err(fault) => {
                let err = DbError::from(fault);
                if err.class() == FaultClass::ServerUnavailable {
                    warn!(
                        database = %self.name(),
                        error = %err,
                        bounded = self.retry_policy.is_bounded(),
                        "Execution failed after reconnecting, retrying"
                    );
                    execute_with_retry(
                        &mut cursor,
                        sql,
                        params,
                        &self.retry_policy,
                        self.name(),
                        err,
                    )
                    .await?;
                    Ok(cursor)
                } else {
                    error!(
                        database = %self.name(),
                        class = %err.class(),
                        error = %err,
                        "Execution failed after reconnecting"
                    );
                    Err(err)
                }
            }
        }
    }
}

impl<D: Driver> std::fmt::Debug for Database<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("params", &self.params)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}
