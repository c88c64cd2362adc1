//! Store commands - the mutations that go through Raft consensus.
//!
//! A command is encoded once by the write gate, appended to the replicated
//! log as opaque bytes, and decoded again by every node's state machine when
//! the entry commits. The encoding is a JSON object:
//!
//! ```text
//! {"op":"set","key":"k","value":"v"}
//! {"op":"delete","key":"k"}
//! ```
//!
//! Empty fields are omitted when encoding and read back as empty strings.

use crate::error::{DecodeError, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const OP_SET: &str = "set";
const OP_DELETE: &str = "delete";

/// A mutation of the key-value map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Insert or overwrite `key`.
    Set {
        /// Key to write. May be empty.
        key: String,
        /// Value to store.
        value: String,
    },

    /// Remove `key`. Removing an absent key is a no-op.
    Delete {
        /// Key to remove. May be empty.
        key: String,
    },
}

/// On-the-wire shape of a command.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WireCommand {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    op: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    value: String,
}

impl Command {
    /// Create a set command.
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Command::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a delete command.
    pub fn delete(key: impl Into<String>) -> Self {
        Command::Delete { key: key.into() }
    }

    /// The operation name as it appears on the wire.
    pub fn op(&self) -> &'static str {
        match self {
            Command::Set { .. } => OP_SET,
            Command::Delete { .. } => OP_DELETE,
        }
    }

    /// The key this command touches.
    pub fn key(&self) -> &str {
        match self {
            Command::Set { key, .. } | Command::Delete { key } => key,
        }
    }

    /// Encode into the replicated log payload.
    pub fn encode(&self) -> StoreResult<EncodedCommand> {
        let wire = match self {
            Command::Set { key, value } => WireCommand {
                op: OP_SET.to_string(),
                key: key.clone(),
                value: value.clone(),
            },
            Command::Delete { key } => WireCommand {
                op: OP_DELETE.to_string(),
                key: key.clone(),
                value: String::new(),
            },
        };

        serde_json::to_vec(&wire)
            .map(EncodedCommand)
            .map_err(|e| StoreError::Encode(e.to_string()))
    }

    /// Decode a replicated log payload.
    ///
    /// Only a JSON object is a command; arrays and scalars are malformed.
    pub fn decode(raw: &[u8]) -> Result<Command, DecodeError> {
        let object = match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Object(object)) => object,
            Ok(other) => {
                return Err(DecodeError::Malformed(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )));
            }
            Err(e) => return Err(DecodeError::Malformed(e.to_string())),
        };
        let wire: WireCommand = serde_json::from_value(Value::Object(object))
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        match wire.op.as_str() {
            OP_SET => Ok(Command::Set {
                key: wire.key,
                value: wire.value,
            }),
            OP_DELETE => Ok(Command::Delete { key: wire.key }),
            _ => Err(DecodeError::UnknownOp(wire.op)),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Opaque command bytes carried in a log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedCommand(pub Vec<u8>);

impl EncodedCommand {
    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for EncodedCommand {
    fn from(bytes: Vec<u8>) -> Self {
        EncodedCommand(bytes)
    }
}

impl fmt::Display for EncodedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}
