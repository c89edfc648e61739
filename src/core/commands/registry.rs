// src/core/commands/registry.rs

//! The process-wide command table, populated before the first client is
//! accepted and read-only thereafter, so lookups take no lock.

use super::spec::{CommandFlags, CommandSpec, ExecFn};
use super::{generic, strings};
use once_cell::sync::Lazy;
use std::collections::HashMap;

static COMMANDS: Lazy<HashMap<&'static str, CommandSpec>> = Lazy::new(|| {
    let mut table = HashMap::new();

    register(&mut table, "ping", 1, CommandFlags::READONLY, generic::ping);

    register(&mut table, "get", 2, CommandFlags::READONLY, strings::get);
    register(&mut table, "set", 3, CommandFlags::WRITE, strings::set);
    register(&mut table, "setnx", 3, CommandFlags::WRITE, strings::setnx);
    register(&mut table, "getset", 3, CommandFlags::WRITE, strings::getset);
    register(&mut table, "strlen", 2, CommandFlags::READONLY, strings::strlen);

    register(&mut table, "del", -2, CommandFlags::WRITE, generic::del);
    register(&mut table, "exists", -2, CommandFlags::READONLY, generic::exists);
    register(&mut table, "flushdb", -1, CommandFlags::WRITE, generic::flushdb);
    register(&mut table, "type", 2, CommandFlags::READONLY, generic::key_type);
    register(&mut table, "rename", 3, CommandFlags::WRITE, generic::rename);
    register(&mut table, "renamenx", 3, CommandFlags::WRITE, generic::renamenx);
    register(&mut table, "keys", 2, CommandFlags::READONLY, generic::keys);

    table
});

fn register(
    table: &mut HashMap<&'static str, CommandSpec>,
    name: &'static str,
    arity: i64,
    flags: CommandFlags,
    handler: ExecFn,
) {
    table.insert(
        name,
        CommandSpec {
            name,
            arity,
            flags,
            handler,
        },
    );
}

/// Looks up a command by its lower-case name.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.get(name)
}

/// Forces the table to be built. Called once from server startup so the
/// registry lifecycle is explicit rather than an implicit first-lookup
/// side effect. Returns the number of registered commands.
pub fn init() -> usize {
    COMMANDS.len()
}
