//! Database access layer.
//!
//! This module provides:
//! - The driver seam the connection handle is generic over
//! - The connection handle with reconnect and retry
//! - The retry policy for server-lost faults
//! - The registry that closes every handle at shutdown
//! - The `sqlx` MySQL driver

pub mod database;
pub mod driver;
pub mod mysql;
pub mod registry;
pub mod retry;

pub use database::{CursorOf, Database};
pub use driver::{Cursor, Driver, DriverConnection, DriverFault, FaultLayer};
pub use mysql::{MySqlCursor, MySqlDriver, MySqlSession};
pub use registry::Registry;
pub use retry::RetryPolicy;
