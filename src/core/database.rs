// src/core/database.rs

//! `Database` — the ordered set of sub-databases a standalone server
//! serves — and the `ExecutionEngine` seam that lets the connection
//! handler drive either a standalone database or the cluster router.

use crate::connection::SessionState;
use crate::core::storage::Db;
use crate::core::{PyropeError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default number of sub-databases when the configuration does not say.
pub const DEFAULT_DATABASES: usize = 16;

/// The execution seam between the connection handler and whichever engine
/// is serving: `Database` standalone, `ClusterDatabase` in cluster mode.
/// Errors never escape; they are rendered as RESP error replies.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn exec(&self, session: &mut SessionState, cmdline: &[Bytes]) -> RespValue;

    /// Releases engine-owned resources at server shutdown.
    async fn close(&self);
}

/// An ordered list of exactly N independent sub-databases.
#[derive(Debug)]
pub struct Database {
    dbs: Vec<Arc<Db>>,
}

impl Database {
    pub fn new(databases: usize) -> Self {
        let count = if databases == 0 {
            DEFAULT_DATABASES
        } else {
            databases
        };
        let dbs = (0..count).map(|index| Arc::new(Db::new(index))).collect();
        Self { dbs }
    }

    pub fn db(&self, index: usize) -> Option<&Arc<Db>> {
        self.dbs.get(index)
    }

    pub fn db_count(&self) -> usize {
        self.dbs.len()
    }

    /// Hands every sub-database its append-only sender.
    pub fn attach_aof(&self, tx: mpsc::Sender<crate::core::persistence::AofRecord>) {
        for db in &self.dbs {
            db.attach_aof(tx.clone());
        }
    }

    /// `SELECT n` — validates and updates the connection's selected
    /// sub-database. Intercepted here; it never reaches `Db::exec`.
    fn exec_select(&self, session: &mut SessionState, index_arg: &Bytes) -> RespValue {
        let Some(index) = std::str::from_utf8(index_arg)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        else {
            return PyropeError::Generic("ERR invalid DB index".into()).into();
        };
        if index >= self.dbs.len() {
            return PyropeError::Generic("ERR DB index is out of range".into()).into();
        }
        session.current_db_index = index;
        RespValue::ok()
    }
}

#[async_trait]
impl ExecutionEngine for Database {
    async fn exec(&self, session: &mut SessionState, cmdline: &[Bytes]) -> RespValue {
        let Some(first) = cmdline.first() else {
            return PyropeError::ProtocolError("empty command".into()).into();
        };
        let name = String::from_utf8_lossy(first).to_ascii_lowercase();

        if name == "select" {
            if cmdline.len() != 2 {
                return PyropeError::WrongArgumentCount("select".into()).into();
            }
            return self.exec_select(session, &cmdline[1]);
        }

        // The session index is validated by SELECT, so this lookup cannot
        // miss for a live connection.
        match self.db(session.current_db_index) {
            Some(db) => db.exec(cmdline).await,
            None => PyropeError::Generic("ERR DB index is out of range".into()).into(),
        }
    }

    async fn close(&self) {}
}
