//! Configuration schema definitions.
//!
//! Every field is optional in the file. Empty strings and zeros mean "not
//! set" and fall back to the built-in value when the merged config is
//! resolved into [`LinkSettings`](super::LinkSettings).

use serde::{Deserialize, Serialize};

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Supplicant process and control socket.
    #[serde(default)]
    pub supplicant: SupplicantConfig,

    /// DHCP client.
    #[serde(default)]
    pub dhcp: DhcpConfig,

    /// WPS pairing.
    #[serde(default)]
    pub pairing: PairingConfig,

    /// Console network addresses.
    #[serde(default)]
    pub console: ConsoleConfig,

    /// Bridge helper command ports.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Persistent files.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Merge another config into this one. Values set in `other` win.
    pub fn merge(&mut self, other: Config) {
        self.general.merge(other.general);
        self.supplicant.merge(other.supplicant);
        self.dhcp.merge(other.dhcp);
        self.pairing.merge(other.pairing);
        self.console.merge(other.console);
        self.bridge.merge(other.bridge);
        self.storage.merge(other.storage);
    }
}

fn override_string(target: &mut String, value: String) {
    if !value.is_empty() {
        *target = value;
    }
}

fn override_number<T: Default + PartialEq>(target: &mut T, value: T) {
    if value != T::default() {
        *target = value;
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub log_level: String,
}

impl GeneralConfig {
    fn merge(&mut self, other: GeneralConfig) {
        override_string(&mut self.log_level, other.log_level);
    }
}

/// Supplicant settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SupplicantConfig {
    /// Supplicant binary. Defaults to `wpa_supplicant_drc` next to the
    /// running executable.
    #[serde(default)]
    pub binary: String,

    /// Driver passed with `-D`.
    #[serde(default)]
    pub driver: String,

    /// Directory holding the per-interface control sockets.
    #[serde(default)]
    pub ctrl_dir: String,

    /// Seconds to wait for the supplicant to report it is initialized.
    #[serde(default)]
    pub startup_wait_secs: u32,
}

impl SupplicantConfig {
    fn merge(&mut self, other: SupplicantConfig) {
        override_string(&mut self.binary, other.binary);
        override_string(&mut self.driver, other.driver);
        override_string(&mut self.ctrl_dir, other.ctrl_dir);
        override_number(&mut self.startup_wait_secs, other.startup_wait_secs);
    }
}

/// DHCP client settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DhcpConfig {
    /// DHCP client binary. Defaults to a bundled `dhclient` if present,
    /// otherwise the system one.
    #[serde(default)]
    pub client: String,

    /// Hook script passed with `-sf`.
    #[serde(default)]
    pub script: String,

    /// Seconds to wait for a lease.
    #[serde(default)]
    pub wait_secs: u32,
}

impl DhcpConfig {
    fn merge(&mut self, other: DhcpConfig) {
        override_string(&mut self.client, other.client);
        override_string(&mut self.script, other.script);
        override_number(&mut self.wait_secs, other.wait_secs);
    }
}

/// Pairing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PairingConfig {
    /// Substring identifying the console in scan results.
    #[serde(default)]
    pub device_marker: String,

    /// Seconds to wait for credentials after sending the PIN.
    #[serde(default)]
    pub credential_wait_secs: u32,

    /// Seconds between scans when the radio is busy.
    #[serde(default)]
    pub scan_retry_secs: u32,
}

impl PairingConfig {
    fn merge(&mut self, other: PairingConfig) {
        override_string(&mut self.device_marker, other.device_marker);
        override_number(&mut self.credential_wait_secs, other.credential_wait_secs);
        override_number(&mut self.scan_retry_secs, other.scan_retry_secs);
    }
}

/// Console addressing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConsoleConfig {
    /// Console IPv4 address on its access point.
    #[serde(default)]
    pub address: String,

    /// Gateway whose default route is removed after DHCP.
    #[serde(default)]
    pub gateway: String,
}

impl ConsoleConfig {
    fn merge(&mut self, other: ConsoleConfig) {
        override_string(&mut self.address, other.address);
        override_string(&mut self.gateway, other.gateway);
    }
}

/// Bridge helper settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Helper command port.
    #[serde(default)]
    pub helper_port: u16,

    /// Local command port.
    #[serde(default)]
    pub client_port: u16,

    /// Milliseconds to wait for BIND_ACK before resending.
    #[serde(default)]
    pub ack_timeout_ms: u32,
}

impl BridgeConfig {
    fn merge(&mut self, other: BridgeConfig) {
        override_number(&mut self.helper_port, other.helper_port);
        override_number(&mut self.client_port, other.client_port);
        override_number(&mut self.ack_timeout_ms, other.ack_timeout_ms);
    }
}

/// Storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory for the authenticate and connect configs.
    #[serde(default)]
    pub state_dir: String,
}

impl StorageConfig {
    fn merge(&mut self, other: StorageConfig) {
        override_string(&mut self.state_dir, other.state_dir);
    }
}
