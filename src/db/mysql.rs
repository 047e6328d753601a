//! MySQL driver built on a single `sqlx` connection.
//!
//! The connection lives behind a shared slot so cursors can execute against
//! it and `close` can take it out. Once closed, every cursor operation fails
//! as an unusable connection, which the handle treats as a lost connection.

use crate::db::driver::{Cursor, Driver, DriverConnection, DriverFault};
use crate::error::{CR_CONN_HOST_ERROR, CR_SERVER_LOST};
use crate::models::{ConnectParams, QueryParam};
use futures_util::TryStreamExt;
use sqlx::mysql::{
    MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow,
};
use sqlx::{ConnectOptions, Connection, Either, Execute, Executor, MySql};
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Default timeout for opening a connection.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Opens `sqlx` MySQL connections.
#[derive(Debug, Clone)]
pub struct MySqlDriver {
    connect_timeout: Duration,
}

impl MySqlDriver {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Set the timeout for opening a connection.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    fn connect_options(params: &ConnectParams) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .database(&params.database);
        if !params.user.is_empty() {
            options = options.username(&params.user);
        }
        if !params.password.is_empty() {
            options = options.password(&params.password);
        }
        options
    }
}

impl Default for MySqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for MySqlDriver {
    type Connection = MySqlSession;

    async fn connect(&self, params: &ConnectParams) -> Result<MySqlSession, DriverFault> {
        let options = Self::connect_options(params);
        debug!(
            target_url = %params.masked_url(),
            timeout_secs = self.connect_timeout.as_secs(),
            "Opening MySQL connection"
        );

        let conn = match tokio::time::timeout(self.connect_timeout, options.connect()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(DriverFault::operational(
                    Some(CR_CONN_HOST_ERROR),
                    format!(
                        "Timed out after {}s connecting to {}:{}",
                        self.connect_timeout.as_secs(),
                        params.host,
                        params.port
                    ),
                ));
            }
        };

        Ok(MySqlSession {
            inner: Arc::new(Mutex::new(Some(conn))),
        })
    }
}

/// A live MySQL connection shared with the cursors created from it.
#[derive(Clone)]
pub struct MySqlSession {
    inner: Arc<Mutex<Option<MySqlConnection>>>,
}

impl DriverConnection for MySqlSession {
    type Cursor = MySqlCursor;

    fn cursor(&self) -> Result<MySqlCursor, DriverFault> {
        // A busy slot means a statement is running, so it is not closed.
        if let Ok(slot) = self.inner.try_lock() {
            if slot.is_none() {
                return Err(DriverFault::unusable("Connection is closed"));
            }
        }
        Ok(MySqlCursor {
            conn: Arc::clone(&self.inner),
            rows: Vec::new(),
            rows_affected: 0,
        })
    }

    async fn close(&self) -> Result<(), DriverFault> {
        let conn = self.inner.lock().await.take();
        match conn {
            Some(conn) => Ok(conn.close().await?),
            None => Err(DriverFault::unusable("Connection already closed")),
        }
    }
}

impl std::fmt::Debug for MySqlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlSession").finish_non_exhaustive()
    }
}

/// Outcome of the last statement executed on a MySQL connection.
pub struct MySqlCursor {
    conn: Arc<Mutex<Option<MySqlConnection>>>,
    rows: Vec<MySqlRow>,
    rows_affected: u64,
}

impl MySqlCursor {
    /// Rows returned by the last statement.
    pub fn rows(&self) -> &[MySqlRow] {
        &self.rows
    }

    /// Take the rows returned by the last statement.
    pub fn into_rows(self) -> Vec<MySqlRow> {
        self.rows
    }

    /// Rows affected by the last statement.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}

impl Cursor for MySqlCursor {
    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> Result<(), DriverFault> {
        let mut slot = self.conn.lock().await;
        let conn = slot
            .as_mut()
            .ok_or_else(|| DriverFault::unusable("Connection is closed"))?;

        // Without params, send raw SQL to avoid prepared statement limitations
        let (rows, rows_affected) = if params.is_empty() {
            drain(conn, sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            drain(conn, query).await?
        };

        self.rows = rows;
        self.rows_affected = rows_affected;
        Ok(())
    }
}

/// Run a statement and collect its rows and affected-row count.
async fn drain<'q, E>(
    conn: &mut MySqlConnection,
    statement: E,
) -> Result<(Vec<MySqlRow>, u64), sqlx::Error>
where
    E: Execute<'q, MySql> + 'q,
{
    let mut rows = Vec::new();
    let mut rows_affected = 0;
    let mut stream = conn.fetch_many(statement);
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(done) => rows_affected += done.rows_affected(),
            Either::Right(row) => rows.push(row),
        }
    }
    Ok((rows, rows_affected))
}

/// Bind a parameter to a MySQL query.
fn bind_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Map `sqlx` errors onto driver faults carrying the MySQL error number.
///
/// Server errors whose SQLSTATE is in class 42 (syntax error or access rule
/// violation) come from the programming layer; all other server errors are
/// operational. A socket that dies mid-statement reports client error 2013.
impl From<sqlx::Error> for DriverFault {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .map(|e| e.number());
                let programming = db_err.code().is_some_and(|state| state.starts_with("42"));
                if programming {
                    DriverFault::programming(code, db_err.message())
                } else {
                    DriverFault::operational(code, db_err.message())
                }
            }
            sqlx::Error::Io(io_err) => match io_err.kind() {
                ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe => DriverFault::operational(
                    Some(CR_SERVER_LOST),
                    format!("Lost connection to server during query: {}", io_err),
                ),
                _ => DriverFault::operational(None, format!("I/O error: {}", io_err)),
            },
            sqlx::Error::Tls(tls_err) => {
                DriverFault::operational(None, format!("TLS error: {}", tls_err))
            }
            sqlx::Error::Protocol(msg) => {
                DriverFault::operational(None, format!("Protocol error: {}", msg))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                DriverFault::operational(None, err.to_string())
            }
            sqlx::Error::RowNotFound
            | sqlx::Error::TypeNotFound { .. }
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_) => DriverFault::programming(None, err.to_string()),
            sqlx::Error::Configuration(msg) => {
                DriverFault::other(format!("Configuration error: {}", msg))
            }
            other => DriverFault::other(format!("Unknown database error: {}", other)),
        }
    }
}
