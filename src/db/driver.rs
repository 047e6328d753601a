//! The driver seam consumed by the connection handle.
//!
//! A [`Driver`] opens connections, a [`DriverConnection`] hands out cursors
//! and can be closed, and a [`Cursor`] executes statements. Failures are
//! reported as raw [`DriverFault`]s; classification happens in
//! [`crate::error`].

use crate::models::{ConnectParams, QueryParam};
use std::future::Future;

/// Layer of the driver a fault was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultLayer {
    /// The connection object itself is no longer usable.
    Interface,
    /// Network, server state, or anything outside the statement's control.
    Operational,
    /// The statement is wrong: syntax, missing objects, bad columns.
    Programming,
    /// Anything the driver could not attribute.
    Other,
}

/// A failure reported by the driver, with the server/client code if known.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DriverFault {
    layer: FaultLayer,
    code: Option<u16>,
    message: String,
}

impl DriverFault {
    pub fn new(layer: FaultLayer, code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            layer,
            code,
            message: message.into(),
        }
    }

    /// The connection reference can no longer be used at all.
    pub fn unusable(message: impl Into<String>) -> Self {
        Self::new(FaultLayer::Interface, None, message)
    }

    pub fn operational(code: Option<u16>, message: impl Into<String>) -> Self {
        Self::new(FaultLayer::Operational, code, message)
    }

    pub fn programming(code: Option<u16>, message: impl Into<String>) -> Self {
        Self::new(FaultLayer::Programming, code, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FaultLayer::Other, None, message)
    }

    pub fn layer(&self) -> FaultLayer {
        self.layer
    }

    pub fn code(&self) -> Option<u16> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Opens connections to a database server.
pub trait Driver: Send + Sync {
    type Connection: DriverConnection;

    /// Open a new connection using the given parameters.
    fn connect(
        &self,
        params: &ConnectParams,
    ) -> impl Future<Output = Result<Self::Connection, DriverFault>> + Send;
}

/// A live connection.
pub trait DriverConnection: Send + Sync {
    type Cursor: Cursor;

    /// Obtain a fresh cursor bound to this connection.
    fn cursor(&self) -> Result<Self::Cursor, DriverFault>;

    /// Close the connection. Fails if it is already closed.
    fn close(&self) -> impl Future<Output = Result<(), DriverFault>> + Send;
}

/// Executes statements and holds the outcome of the last one.
pub trait Cursor: Send {
    fn execute(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> impl Future<Output = Result<(), DriverFault>> + Send;
}
