// src/connection/session.rs

//! Defines the state associated with a single client session.

/// Holds the state specific to a single client session.
#[derive(Debug, Default)]
pub struct SessionState {
    /// The index of the sub-database the client is currently attached to.
    /// Updated only by a validated `SELECT`.
    pub current_db_index: usize,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }
}
