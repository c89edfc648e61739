// src/core/commands/strings.rs

//! Executors for the string commands.

use super::spec::WriteOutcome;
use crate::core::storage::{DataValue, Db};
use crate::core::{PyropeError, RespValue};
use bytes::Bytes;

/// `GET key` — bulk reply, or null bulk for a missing key.
pub fn get(db: &Db, args: &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError> {
    let reply = match db.data.get(&args[0]) {
        Some(value) => {
            let bytes = value.as_str().ok_or(PyropeError::WrongType)?.clone();
            RespValue::BulkString(bytes)
        }
        None => RespValue::null(),
    };
    Ok((reply, WriteOutcome::DidNotWrite))
}

/// `SET key value` — always OK.
pub fn set(db: &Db, args: &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError> {
    db.data
        .put(args[0].clone(), DataValue::Str(args[1].clone()));
    Ok((RespValue::ok(), WriteOutcome::Write { keys_modified: 1 }))
}

/// `SETNX key value` — 1 if inserted, 0 if the key already existed.
pub fn setnx(db: &Db, args: &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError> {
    let inserted = db
        .data
        .put_if_absent(args[0].clone(), DataValue::Str(args[1].clone()));
    let outcome = if inserted == 1 {
        WriteOutcome::Write { keys_modified: 1 }
    } else {
        WriteOutcome::DidNotWrite
    };
    Ok((RespValue::Integer(inserted as i64), outcome))
}

/// `GETSET key value` — stores the new value and returns the previous one.
pub fn getset(db: &Db, args: &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError> {
    let previous = match db.data.get(&args[0]) {
        Some(value) => {
            let bytes = value.as_str().ok_or(PyropeError::WrongType)?.clone();
            RespValue::BulkString(bytes)
        }
        None => RespValue::null(),
    };
    db.data
        .put(args[0].clone(), DataValue::Str(args[1].clone()));
    Ok((previous, WriteOutcome::Write { keys_modified: 1 }))
}

/// `STRLEN key` — integer length, or null bulk for a missing key.
pub fn strlen(db: &Db, args: &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError> {
    let reply = match db.data.get(&args[0]) {
        Some(value) => {
            let bytes = value.as_str().ok_or(PyropeError::WrongType)?;
            RespValue::Integer(bytes.len() as i64)
        }
        None => RespValue::null(),
    };
    Ok((reply, WriteOutcome::DidNotWrite))
}
