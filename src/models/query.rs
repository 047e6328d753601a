//! Statement parameter model.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};

/// A positional parameter bound to a statement.
///
/// JSON strings always read back as [`QueryParam::String`]; `Bytes` is only
/// built in code and written out as base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(serialize_with = "base64_bytes::serialize", skip_deserializing)]
    Bytes(Vec<u8>),
}

impl QueryParam {
    /// Parse a JSON array of scalars into positional parameters.
    pub fn parse_json_list(json: &str) -> DbResult<Vec<Self>> {
        serde_json::from_str(json)
            .map_err(|e| DbError::invalid_input(format!("Invalid parameter list: {e}")))
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }
}
