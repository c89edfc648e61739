// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
///
/// The `Display` form of each variant is exactly the text that goes on the
/// wire after the leading `-`, so converting an error into a RESP error
/// frame is a plain `to_string()`.
#[derive(Error, Debug)]
pub enum PyropeError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Incomplete data in stream")]
    IncompleteData,

    #[error("ERR unknown command {0}")]
    UnknownCommand(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArgumentCount(String),

    #[error("Err syntax error")]
    SyntaxError,

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR Protocol error: '{0}'")]
    ProtocolError(String),

    #[error("ERR rename must within one peer")]
    RenameAcrossPeers,

    /// A generic error whose message goes on the wire verbatim (e.g. `no such key`).
    #[error("{0}")]
    Generic(String),

    #[error("Persistence Error: {0}")]
    AofError(String),

    #[error("ERR {0}")]
    ClusterError(String),

    #[error("Err unknown")]
    Unknown,
}

impl From<std::io::Error> for PyropeError {
    fn from(e: std::io::Error) -> Self {
        PyropeError::Io(Arc::new(e))
    }
}
