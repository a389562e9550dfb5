//! padlink: GamePad link client
//!
//! This crate brings up the wireless link to a console and carries the
//! five-channel UDP session over it.
//!
//! # Lifecycle
//!
//! Pair once per console, connect once per session. A successful connect
//! invokes the caller's callback with the link up; the callback typically
//! opens a [`Session`](transport::Session) and holds it until the
//! [`CancelToken`](cancel::CancelToken) is raised. Everything acquired along
//! the way is released in reverse order on return.
//!
//! # Architecture
//!
//! - **Orchestrator**: WPS pairing and connect automata around the supplicant
//! - **Supplicant**: Control socket client, event and scan-result parsing
//! - **Network**: NetworkManager hand-off, DHCP and route side effects
//! - **Process**: Subprocess launch, output polling and scoped termination
//! - **Transport**: UDP channels, receive loops and the bridge handshake
//! - **Config**: Hierarchical TOML configuration
//! - **Telemetry**: Structured syslog logging for audit trails

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cancel;
pub mod cli;
pub mod cli_handler;
pub mod config;
pub mod error;
pub mod network;
pub mod orchestrator;
pub mod process;
pub mod supplicant;
pub mod telemetry;
pub mod transport;

pub use cancel::CancelToken;
pub use error::{ErrorKind, LinkError};
pub use orchestrator::{Orchestrator, PairingArtifact};
