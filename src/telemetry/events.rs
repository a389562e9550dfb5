//! Audit event types for structured logging.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Link lifecycle events recorded in the audit log.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// WPS pairing started on an interface.
    PairingStarted {
        /// Wireless interface.
        interface: String,
    },

    /// A console accepted the PIN and credentials were saved.
    PairingComplete {
        /// Wireless interface.
        interface: String,
        /// BSSID of the paired console.
        bssid: String,
        /// Where the connect configuration was written.
        config_path: String,
    },

    /// A matching access point never delivered credentials.
    CredentialTimeout {
        /// BSSID that was abandoned.
        bssid: String,
    },

    /// NetworkManager control of the interface was changed.
    ManagedStateChanged {
        /// Wireless interface.
        interface: String,
        /// New managed state.
        managed: bool,
    },

    /// The supplicant reported association with the console.
    LinkConnected {
        /// Wireless interface.
        interface: String,
    },

    /// The DHCP client obtained a lease.
    DhcpBound {
        /// Wireless interface.
        interface: String,
    },

    /// A transport session opened its channels.
    SessionStart {
        /// Transport variant (`direct` or `bridged`).
        transport: String,
        /// Offset added to every base port.
        port_offset: u16,
    },

    /// A transport session closed.
    SessionEnd {
        /// Transport variant.
        transport: String,
        /// Duration of the session in seconds.
        duration_sec: u64,
    },
}

/// Wrapper for serializing events with timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent<'a> {
    /// ISO8601 timestamp.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// The actual event (flattened into this struct).
    #[serde(flatten)]
    pub event: &'a AuditEvent,
}

impl AuditEvent {
    /// Wrap this event with a timestamp for serialization.
    pub fn with_timestamp(&self) -> TimestampedEvent<'_> {
        TimestampedEvent {
            timestamp: Utc::now(),
            event: self,
        }
    }

    /// Serialize with the current time as one JSON line.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.with_timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairing_complete_serialization() {
        let event = AuditEvent::PairingComplete {
            interface: "wlan1".to_string(),
            bssid: "00:11:22:33:44:55".to_string(),
            config_path: "/var/lib/padlink/connect.conf".to_string(),
        };

        let json = event.to_json().unwrap();

        assert!(json.contains("\"event\":\"pairing_complete\""));
        assert!(json.contains("\"interface\":\"wlan1\""));
        assert!(json.contains("\"bssid\":\"00:11:22:33:44:55\""));
        assert!(json.contains("\"ts\""));
    }

    #[test]
    fn test_managed_state_serialization() {
        let event = AuditEvent::ManagedStateChanged {
            interface: "wlan1".to_string(),
            managed: false,
        };

        let json = event.to_json().unwrap();

        assert!(json.contains("\"event\":\"managed_state_changed\""));
        assert!(json.contains("\"managed\":false"));
    }

    #[test]
    fn test_session_serialization() {
        let start = AuditEvent::SessionStart {
            transport: "bridged".to_string(),
            port_offset: 200,
        };
        let json = start.to_json().unwrap();
        assert!(json.contains("\"event\":\"session_start\""));
        assert!(json.contains("\"port_offset\":200"));

        let end = AuditEvent::SessionEnd {
            transport: "direct".to_string(),
            duration_sec: 42,
        };
        let json = end.to_json().unwrap();
        assert!(json.contains("\"event\":\"session_end\""));
        assert!(json.contains("\"duration_sec\":42"));
    }

    #[test]
    fn test_credential_timeout_serialization() {
        let event = AuditEvent::CredentialTimeout {
            bssid: "00:11:22:33:44:55".to_string(),
        };
        let json = event.to_json().unwrap();
        assert!(json.contains("\"event\":\"credential_timeout\""));
    }
}
