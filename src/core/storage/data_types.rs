// src/core/storage/data_types.rs

//! Defines the stored value type held by the keyspace dictionaries.

use bytes::Bytes;

/// The single stored value type: a discriminated holder whose payload is
/// currently a byte string. The shape extends to lists/sets/hashes without
/// changing the dictionary contract.
///
/// Values are copied into the dictionary and never mutated in place;
/// `Bytes` keeps that copy cheap.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Str(Bytes),
}

impl DataValue {
    /// The tag reported by the `TYPE` command.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Str(_) => "string",
        }
    }

    /// Returns the byte-string payload, or `None` for a non-string value.
    pub fn as_str(&self) -> Option<&Bytes> {
        match self {
            DataValue::Str(b) => Some(b),
        }
    }
}
