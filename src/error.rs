//! Error types for simbridge
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type for simbridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Malformed header: expected at least 4 bytes, got {len}")]
    MalformedHeader { len: usize },

    #[error("Malformed {command} payload: {reason}")]
    MalformedPayload {
        command: &'static str,
        reason: String,
    },

    #[error("Unknown command: {0}")]
    UnknownCommand(i32),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Unable to open logfile \"{}\": {source}", path.display())]
    LogOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session fault: {0}")]
    SessionFault(String),

    // -------------------------------------------------------------------------
    // Server Errors
    // -------------------------------------------------------------------------
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Build a `MalformedPayload` error for the named command
    pub fn malformed(command: &'static str, reason: impl Into<String>) -> Self {
        BridgeError::MalformedPayload {
            command,
            reason: reason.into(),
        }
    }

    /// True for codec and dispatch faults caused by what a client sent.
    ///
    /// Transport errors are not faults: the peer simply went away.
    pub fn is_protocol_fault(&self) -> bool {
        matches!(
            self,
            BridgeError::MalformedHeader { .. }
                | BridgeError::MalformedPayload { .. }
                | BridgeError::UnknownCommand(_)
                | BridgeError::LogOpen { .. }
        )
    }

    /// True when the error means the peer disconnected or the socket was closed
    pub fn is_disconnect(&self) -> bool {
        match self {
            BridgeError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}
