//! Error types for lockstep

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Checkpoint Errors ===
    #[error("Connection broken: {0}")]
    ConnectionBroken(String),

    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    // === Registry Errors ===
    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    #[error("Duplicate group: {0}")]
    DuplicateGroup(String),

    // === Coordinator Errors ===
    #[error("Group {group} is full ({capacity} members)")]
    CapacityExceeded { group: String, capacity: usize },

    #[error("User {user} is not a member of group {group}")]
    UnknownMember { group: String, user: String },

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Did the transport to the checkpoint service fail?
    ///
    /// When true, the in-memory state may be ahead of the last stored
    /// snapshot; the caller decides whether to surface or shrug.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::ConnectionBroken(_) | Error::Io(_))
    }
}

// Implement From for common error types
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
