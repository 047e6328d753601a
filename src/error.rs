//! Error types for resilient database access.
//!
//! Every failure reported by the driver is classified into a [`FaultClass`]
//! and surfaced as a [`DbError`] variant, so callers can match on the
//! category instead of digging a numeric code out of a generic error.

use crate::db::driver::{DriverFault, FaultLayer};
use thiserror::Error;

/// MySQL server error: SQL syntax error.
pub const ER_PARSE_ERROR: u16 = 1064;
/// MySQL server error: table does not exist.
pub const ER_NO_SUCH_TABLE: u16 = 1146;
/// MySQL client error: can't connect to local server.
pub const CR_CONNECTION_ERROR: u16 = 2002;
/// MySQL client error: can't connect to server on host.
pub const CR_CONN_HOST_ERROR: u16 = 2003;
/// MySQL client error: server has gone away.
pub const CR_SERVER_GONE_ERROR: u16 = 2006;
/// MySQL client error: lost connection to server during query.
pub const CR_SERVER_LOST: u16 = 2013;
/// MySQL client error: lost connection to server (extended).
pub const CR_SERVER_LOST_EXTENDED: u16 = 2055;

/// Category a driver fault falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultClass {
    /// The connection is gone or unusable; recoverable by reconnecting.
    ConnectionLost,
    /// The server severed an established connection mid-statement.
    ServerUnavailable,
    /// The statement does not parse.
    Syntax,
    /// The statement references a table that does not exist.
    MissingSchemaObject,
    /// Any other fault raised by the programming layer with a code.
    Programming,
    /// Any other operational fault with a code.
    Operational,
    /// No usable code.
    Unclassified,
}

impl FaultClass {
    /// Classify a raw driver fault.
    pub fn of(fault: &DriverFault) -> Self {
        if fault.layer() == FaultLayer::Interface {
            return Self::ConnectionLost;
        }
        match (fault.layer(), fault.code()) {
            (_, Some(CR_SERVER_LOST)) => Self::ServerUnavailable,
            (_, Some(ER_PARSE_ERROR)) => Self::Syntax,
            (_, Some(ER_NO_SUCH_TABLE)) => Self::MissingSchemaObject,
            (
                _,
                Some(
                    CR_CONNECTION_ERROR
                    | CR_CONN_HOST_ERROR
                    | CR_SERVER_GONE_ERROR
                    | CR_SERVER_LOST_EXTENDED,
                ),
            ) => Self::ConnectionLost,
            (FaultLayer::Operational, None) => Self::ConnectionLost,
            (FaultLayer::Operational, Some(_)) => Self::Operational,
            (FaultLayer::Programming, Some(_)) => Self::Programming,
            _ => Self::Unclassified,
        }
    }

    /// Whether the handle reconnects and re-executes on this class.
    pub fn triggers_reconnect(&self) -> bool {
        matches!(self, Self::ConnectionLost | Self::ServerUnavailable)
    }

    /// Whether this class originates from the programming layer.
    pub fn is_programming(&self) -> bool {
        matches!(
            self,
            Self::Syntax | Self::MissingSchemaObject | Self::Programming
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionLost => "connection-lost",
            Self::ServerUnavailable => "server-temporarily-unavailable",
            Self::Syntax => "syntax-error",
            Self::MissingSchemaObject => "missing-schema-object",
            Self::Programming => "programming",
            Self::Operational => "other-operational",
            Self::Unclassified => "unclassified",
        }
    }
}

impl std::fmt::Display for FaultClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("Connection lost: {message}")]
    ConnectionLost { message: String },

    #[error("Server temporarily unavailable ({code}): {message}")]
    ServerUnavailable { code: u16, message: String },

    #[error("SQL syntax error ({code}): {message}")]
    Syntax { code: u16, message: String },

    #[error("Missing schema object ({code}): {message}")]
    MissingSchemaObject { code: u16, message: String },

    #[error("Programming error ({code}): {message}")]
    Programming { code: u16, message: String },

    #[error("Operational error ({code}): {message}")]
    Operational { code: u16, message: String },

    #[error("Database error: {message}")]
    Unclassified { message: String },

    #[error("Retries exhausted after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// Malformed caller input, such as a statement parameter list.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl DbError {
    /// Create a connection-lost error.
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::ConnectionLost {
            message: message.into(),
        }
    }

    /// Create a retries-exhausted error.
    pub fn retries_exhausted(attempts: u32, message: impl Into<String>) -> Self {
        Self::RetriesExhausted {
            attempts,
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Fault category of this error.
    ///
    /// Exhausted retries keep the class of the fault that was being retried.
    /// Invalid input never reaches the driver and is unclassified.
    pub fn class(&self) -> FaultClass {
        match self {
            Self::ConnectionLost { .. } => FaultClass::ConnectionLost,
            Self::ServerUnavailable { .. } | Self::RetriesExhausted { .. } => {
                FaultClass::ServerUnavailable
            }
            Self::Syntax { .. } => FaultClass::Syntax,
            Self::MissingSchemaObject { .. } => FaultClass::MissingSchemaObject,
            Self::Programming { .. } => FaultClass::Programming,
            Self::Operational { .. } => FaultClass::Operational,
            Self::Unclassified { .. } | Self::InvalidInput { .. } => FaultClass::Unclassified,
        }
    }

    /// Driver error code, if the fault carried one.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::ServerUnavailable { code, .. }
            | Self::Syntax { code, .. }
            | Self::MissingSchemaObject { code, .. }
            | Self::Programming { code, .. }
            | Self::Operational { code, .. } => Some(*code),
            Self::RetriesExhausted { .. } => Some(CR_SERVER_LOST),
            _ => None,
        }
    }
}

impl From<DriverFault> for DbError {
    fn from(fault: DriverFault) -> Self {
        let class = FaultClass::of(&fault);
        let code = fault.code().unwrap_or_default();
        let message = fault.message().to_string();
        match class {
            FaultClass::ConnectionLost => Self::ConnectionLost { message },
            FaultClass::ServerUnavailable => Self::ServerUnavailable { code, message },
            FaultClass::Syntax => Self::Syntax { code, message },
            FaultClass::MissingSchemaObject => Self::MissingSchemaObject { code, message },
            FaultClass::Programming => Self::Programming { code, message },
            FaultClass::Operational => Self::Operational { code, message },
            FaultClass::Unclassified => Self::Unclassified { message },
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
