//! Audit telemetry for padlink.
//!
//! Link lifecycle events are written to syslog with the `PADLINK` tag as
//! single-line JSON. This is separate from diagnostic logging, which goes to
//! stderr through `tracing`.
//!
//! # Event Format
//!
//! ```json
//! {"ts":"2026-01-07T14:32:01Z","event":"pairing_complete","interface":"wlan1","bssid":"00:11:22:33:44:55","config_path":"/var/lib/padlink/connect.conf"}
//! ```

mod error;
mod events;
mod syslog;

pub use error::TelemetryError;
pub use events::AuditEvent;
pub use syslog::{AuditLogger, SYSLOG_TAG};
