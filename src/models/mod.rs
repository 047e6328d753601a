//! Data models shared by the driver seam and the connection handle.

pub mod connection;
pub mod query;

pub use connection::{ConnectParams, ConnectParamsError, DEFAULT_MYSQL_PORT};
pub use query::QueryParam;
