// src/core/commands/generic.rs

//! Executors for the key-space and connection commands.

use super::spec::WriteOutcome;
use crate::core::storage::Db;
use crate::core::{PyropeError, RespValue};
use bytes::Bytes;
use wildmatch::WildMatch;

/// `PING` — always `+PONG`.
pub fn ping(_db: &Db, _args: &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError> {
    Ok((RespValue::pong(), WriteOutcome::DidNotWrite))
}

/// `DEL key [key ...]` — the count of keys actually removed.
pub fn del(db: &Db, args: &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError> {
    let deleted: usize = args.iter().map(|key| db.data.remove(key)).sum();
    let outcome = if deleted > 0 {
        WriteOutcome::Delete {
            keys_deleted: deleted as u64,
        }
    } else {
        WriteOutcome::DidNotWrite
    };
    Ok((RespValue::Integer(deleted as i64), outcome))
}

/// `EXISTS key [key ...]` — the count of keys that exist.
pub fn exists(db: &Db, args: &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError> {
    let found = args.iter().filter(|key| db.data.get(key).is_some()).count();
    Ok((RespValue::Integer(found as i64), WriteOutcome::DidNotWrite))
}

/// `FLUSHDB` — clears this sub-database only.
pub fn flushdb(db: &Db, _args: &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError> {
    db.data.clear();
    Ok((RespValue::ok(), WriteOutcome::Flush))
}

/// `TYPE key` — `+string` for byte-string entities, `+none` for absent keys.
pub fn key_type(db: &Db, args: &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError> {
    let tag = match db.data.get(&args[0]) {
        Some(value) => value.type_name(),
        None => "none",
    };
    Ok((
        RespValue::SimpleString(tag.into()),
        WriteOutcome::DidNotWrite,
    ))
}

/// `RENAME src dst` — moves the entity; errors when `src` is missing.
pub fn rename(db: &Db, args: &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError> {
    let entity = db
        .data
        .get(&args[0])
        .ok_or_else(|| PyropeError::Generic("no such key".into()))?;
    db.data.put(args[1].clone(), entity);
    db.data.remove(&args[0]);
    Ok((RespValue::ok(), WriteOutcome::Write { keys_modified: 2 }))
}

/// `RENAMENX src dst` — 1 if moved, 0 if `dst` already existed, error when
/// `src` is missing.
pub fn renamenx(db: &Db, args: &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError> {
    if db.data.get(&args[1]).is_some() {
        return Ok((RespValue::Integer(0), WriteOutcome::DidNotWrite));
    }
    let entity = db
        .data
        .get(&args[0])
        .ok_or_else(|| PyropeError::Generic("no such key".into()))?;
    db.data.put(args[1].clone(), entity);
    db.data.remove(&args[0]);
    Ok((
        RespValue::Integer(1),
        WriteOutcome::Write { keys_modified: 2 },
    ))
}

/// `KEYS pattern` — multi-bulk of the keys matching a glob-style pattern.
pub fn keys(db: &Db, args: &[Bytes]) -> Result<(RespValue, WriteOutcome), PyropeError> {
    let pattern = std::str::from_utf8(&args[0]).map_err(|_| PyropeError::SyntaxError)?;
    let matcher = WildMatch::new(pattern);

    let mut matched = Vec::new();
    db.data.for_each(|key, _| {
        if matcher.matches(&String::from_utf8_lossy(key)) {
            matched.push(RespValue::BulkString(key.clone()));
        }
        true
    });
    Ok((RespValue::Array(matched), WriteOutcome::DidNotWrite))
}
