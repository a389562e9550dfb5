//! Error types for the supplicant control channel.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the supplicant control socket.
#[derive(Debug, Error)]
pub enum CtrlError {
    /// The control socket does not exist yet or refuses connections.
    #[error("Control socket unavailable: {path}")]
    Unavailable {
        /// Socket path that was tried.
        path: PathBuf,
    },

    /// I/O failure on the control socket.
    #[error("Control socket {op} failed: {source}")]
    Io {
        /// Operation that failed.
        op: &'static str,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No reply arrived within the request timeout.
    #[error("No reply to '{command}'")]
    Timeout {
        /// Command that went unanswered.
        command: String,
    },

    /// The supplicant answered with something other than `OK`.
    #[error("'{command}' rejected: {reply}")]
    Rejected {
        /// Command that was rejected.
        command: String,
        /// Reply text, trimmed.
        reply: String,
    },
}

impl CtrlError {
    pub(crate) fn io(op: &'static str, source: std::io::Error) -> Self {
        Self::Io { op, source }
    }
}
