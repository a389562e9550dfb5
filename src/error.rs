//! Crate-level error type.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::process::ProcessError;
use crate::supplicant::CtrlError;
use crate::transport::TransportError;

/// Coarse classification of a [`LinkError`] for callers deciding whether to
/// retry or report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A subprocess did not report what was expected in time.
    Timeout,
    /// A file, socket, port or program could not be acquired.
    Resource,
    /// A required endpoint or artifact does not exist.
    Unavailable,
    /// The cancellation token was raised.
    Cancelled,
    /// The caller's connected callback failed.
    Callback,
    /// An argument was outside its accepted range.
    InvalidArgument,
}

/// Errors from pairing, connecting and running a session.
#[derive(Debug, Error)]
pub enum LinkError {
    /// A supplicant configuration file could not be written.
    #[error("Failed to write {path}: {source}")]
    ConfigWrite {
        /// File that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Connect was called before pairing produced a connect config.
    #[error("No pairing found at {path}")]
    NotPaired {
        /// Expected connect config path.
        path: PathBuf,
    },

    /// Subprocess failure.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Supplicant control socket failure.
    #[error(transparent)]
    Control(#[from] CtrlError),

    /// UDP transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A caller-supplied argument was rejected before any side effect.
    #[error("Invalid {name}: {message}")]
    InvalidArgument {
        /// Name of the offending argument.
        name: &'static str,
        /// Why it was rejected.
        message: String,
    },

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// The connected callback returned an error.
    #[error("Connected callback failed: {0}")]
    Callback(String),
}

impl LinkError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinkError::ConfigWrite { .. } | LinkError::Config(_) => ErrorKind::Resource,
            LinkError::NotPaired { .. } => ErrorKind::Unavailable,
            LinkError::Process(e) => match e {
                ProcessError::OutputTimeout { .. } | ProcessError::OutputClosed { .. } => {
                    ErrorKind::Timeout
                }
                _ => ErrorKind::Resource,
            },
            LinkError::Control(e) => match e {
                CtrlError::Unavailable { .. } => ErrorKind::Unavailable,
                CtrlError::Timeout { .. } => ErrorKind::Timeout,
                _ => ErrorKind::Resource,
            },
            LinkError::Transport(e) => match e {
                TransportError::Cancelled => ErrorKind::Cancelled,
                TransportError::Closed(_) => ErrorKind::Unavailable,
                _ => ErrorKind::Resource,
            },
            LinkError::Cancelled => ErrorKind::Cancelled,
            LinkError::Callback(_) => ErrorKind::Callback,
            LinkError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
        }
    }

    /// Whether this error is a cancellation, from any layer.
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}
