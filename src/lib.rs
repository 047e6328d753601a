//! Resilient single-connection MySQL access.
//!
//! This library provides a connection handle that connects lazily, recovers
//! from dropped connections and transient server-lost faults, and classifies
//! every other failure; a call guard that turns database faults into a
//! fallback value; and a registry that closes every handle at shutdown.

pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod models;

pub use config::Config;
pub use db::{Database, MySqlDriver, Registry, RetryPolicy};
pub use error::{DbError, DbResult, FaultClass};
pub use guard::{run_guarded, run_guarded_blocking};
