//! Transport error types.

use thiserror::Error;

use super::channel::Channel;

/// Errors from opening or using a transport session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A channel socket could not be bound.
    #[error("Failed to bind {channel} channel on port {port}: {source}")]
    Bind {
        /// Channel being opened.
        channel: Channel,
        /// Local port requested.
        port: u16,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The bridge command socket could not be set up.
    #[error("Failed to open bridge command socket on port {port}: {source}")]
    CommandSocket {
        /// Local port requested.
        port: u16,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The port offset pushes a channel past the last port.
    #[error("Port offset {offset} puts the {channel} channel past port 65535")]
    PortRange {
        /// First channel that does not fit.
        channel: Channel,
        /// Offset requested.
        offset: u16,
    },

    /// A datagram could not be sent.
    #[error("Failed to send on {channel} channel: {source}")]
    Send {
        /// Channel used.
        channel: Channel,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The channel has been closed.
    #[error("{0} channel is closed")]
    Closed(Channel),

    /// A receive thread could not be started.
    #[error("Failed to start {channel} receive loop: {source}")]
    Thread {
        /// Channel whose loop failed to start.
        channel: Channel,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Cancelled before the transport was ready.
    #[error("Transport setup cancelled")]
    Cancelled,
}
