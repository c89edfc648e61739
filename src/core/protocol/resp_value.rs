// src/core/protocol/resp_value.rs

//! Defines a simplified value type for use within the command execution layer.

use crate::core::PyropeError;
use bytes::Bytes;

/// `RespValue` is a simplified version of `RespFrame`.
///
/// It's used as the return type for command execution logic. The command
/// layer only needs to produce values, never parse them, so it stays free
/// of wire-protocol concerns until the value is converted into a
/// `RespFrame` for the network.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    BulkString(Bytes),
    Integer(i64),
    Array(Vec<RespValue>),
    Null,
    NullArray,
    Error(String),
}

impl RespValue {
    /// The canonical `+OK\r\n` reply.
    pub fn ok() -> RespValue {
        RespValue::SimpleString("OK".into())
    }

    /// The canonical `+PONG\r\n` reply.
    pub fn pong() -> RespValue {
        RespValue::SimpleString("PONG".into())
    }

    /// The null bulk reply `$-1\r\n`, used for missing keys.
    pub fn null() -> RespValue {
        RespValue::Null
    }

    /// The empty multi-bulk reply `*0\r\n`.
    pub fn empty_array() -> RespValue {
        RespValue::Array(Vec::new())
    }

    /// True iff the encoded form of this reply starts with `-`.
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Encodes the reply into its exact wire representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        super::RespFrame::from(self.clone()).encode_to_vec()
    }
}

/// Implements the conversion from the internal `RespValue` to the wire-protocol `RespFrame`.
impl From<RespValue> for super::RespFrame {
    fn from(val: RespValue) -> Self {
        match val {
            RespValue::SimpleString(s) => super::RespFrame::SimpleString(s),
            RespValue::BulkString(b) => super::RespFrame::BulkString(b),
            RespValue::Integer(i) => super::RespFrame::Integer(i),
            // Recursively convert elements of an array.
            RespValue::Array(arr) => {
                super::RespFrame::Array(arr.into_iter().map(Into::into).collect())
            }
            RespValue::Null => super::RespFrame::Null,
            RespValue::NullArray => super::RespFrame::NullArray,
            RespValue::Error(s) => super::RespFrame::Error(s),
        }
    }
}

/// The inverse conversion, used when a relayed peer reply re-enters the
/// execution layer.
impl From<super::RespFrame> for RespValue {
    fn from(frame: super::RespFrame) -> Self {
        match frame {
            super::RespFrame::SimpleString(s) => RespValue::SimpleString(s),
            super::RespFrame::Error(s) => RespValue::Error(s),
            super::RespFrame::Integer(i) => RespValue::Integer(i),
            super::RespFrame::BulkString(b) => RespValue::BulkString(b),
            super::RespFrame::Null => RespValue::Null,
            super::RespFrame::NullArray => RespValue::NullArray,
            super::RespFrame::Array(arr) => {
                RespValue::Array(arr.into_iter().map(Into::into).collect())
            }
        }
    }
}

/// Every error has a RESP error-frame rendition; the `Display` text of
/// `PyropeError` is the wire text after the leading `-`.
impl From<PyropeError> for RespValue {
    fn from(e: PyropeError) -> Self {
        RespValue::Error(e.to_string())
    }
}
