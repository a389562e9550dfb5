//! Resolved, typed settings used by the orchestrator and transports.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::ConfigError;
use super::schema::Config;
use crate::network::DhcpClient;
use crate::transport::{BridgeSettings, DEFAULT_CONSOLE_ADDRESS};

/// Default supplicant binary name, looked up next to the executable.
pub const SUPPLICANT_NAME: &str = "wpa_supplicant_drc";

/// Default control socket directory.
pub const DEFAULT_CTRL_DIR: &str = "/var/run/wpa_supplicant_drc";

/// Default substring identifying the console in scan results.
pub const DEFAULT_DEVICE_MARKER: &str = "WiiU";

/// Gateway the console's DHCP server advertises.
pub const DEFAULT_GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

const AUTHENTICATE_CONFIG_FILE: &str = "authenticate.conf";
const CONNECT_CONFIG_FILE: &str = "connect.conf";
const STATE_DIR_NAME: &str = "padlink";

/// Poll intervals and retry budgets for bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Length of one subprocess output poll.
    pub output_poll: Duration,
    /// Idle polls allowed while waiting for the supplicant to start.
    pub supplicant_attempts: u32,
    /// Idle polls allowed while waiting for a DHCP lease.
    pub dhcp_attempts: u32,
    /// Delay between control socket open attempts.
    pub ctrl_open_retry: Duration,
    /// Delay before rescanning after a busy or unexpected SCAN reply.
    pub scan_retry: Duration,
    /// Delay between checks for WPS events.
    pub credential_poll: Duration,
    /// Checks for WPS events before abandoning a BSSID.
    pub credential_attempts: u32,
    /// Delay between checks for the connected event.
    pub connect_poll: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            output_poll: Duration::from_secs(1),
            supplicant_attempts: 5,
            dhcp_attempts: 5,
            ctrl_open_retry: Duration::from_secs(1),
            scan_retry: Duration::from_secs(5),
            credential_poll: Duration::from_secs(1),
            credential_attempts: 20,
            connect_poll: Duration::from_secs(2),
        }
    }
}

/// Everything the bring-up automaton needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Supplicant binary.
    pub supplicant: PathBuf,
    /// Supplicant driver name.
    pub driver: String,
    /// Control socket directory.
    pub ctrl_dir: PathBuf,
    /// DHCP client to run after association.
    pub dhcp: DhcpClient,
    /// Substring identifying the console in scan results.
    pub device_marker: String,
    /// Console address.
    pub console: Ipv4Addr,
    /// Gateway whose default route is removed after DHCP.
    pub gateway: Ipv4Addr,
    /// Bridge helper command port.
    pub bridge_helper_port: u16,
    /// Local bridge command port.
    pub bridge_client_port: u16,
    /// Wait for BIND_ACK before resending.
    pub bridge_ack_timeout: Duration,
    /// Directory for supplicant config files.
    pub state_dir: PathBuf,
    /// Poll intervals and retry budgets.
    pub timing: Timing,
}

impl Default for LinkSettings {
    fn default() -> Self {
        let exe_dir = executable_dir();
        let bridge = BridgeSettings::new(Ipv4Addr::UNSPECIFIED);

        Self {
            supplicant: exe_dir
                .as_deref()
                .map(|dir| dir.join(SUPPLICANT_NAME))
                .unwrap_or_else(|| PathBuf::from(SUPPLICANT_NAME)),
            driver: "nl80211".to_string(),
            ctrl_dir: PathBuf::from(DEFAULT_CTRL_DIR),
            dhcp: DhcpClient::locate(exe_dir.as_deref()),
            device_marker: DEFAULT_DEVICE_MARKER.to_string(),
            console: DEFAULT_CONSOLE_ADDRESS,
            gateway: DEFAULT_GATEWAY,
            bridge_helper_port: bridge.helper_port,
            bridge_client_port: bridge.client_port,
            bridge_ack_timeout: bridge.ack_timeout,
            state_dir: dirs::data_dir()
                .map(|p| p.join(STATE_DIR_NAME))
                .unwrap_or_else(|| PathBuf::from(".local/share").join(STATE_DIR_NAME)),
            timing: Timing::default(),
        }
    }
}

impl LinkSettings {
    /// Apply the values set in `config` on top of the built-in defaults.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        let supplicant = &config.supplicant;
        if !supplicant.binary.is_empty() {
            settings.supplicant = PathBuf::from(&supplicant.binary);
        }
        if !supplicant.driver.is_empty() {
            settings.driver = supplicant.driver.clone();
        }
        if !supplicant.ctrl_dir.is_empty() {
            settings.ctrl_dir = PathBuf::from(&supplicant.ctrl_dir);
        }
        if supplicant.startup_wait_secs != 0 {
            settings.timing.supplicant_attempts = supplicant.startup_wait_secs;
        }

        let dhcp = &config.dhcp;
        if !dhcp.client.is_empty() {
            settings.dhcp = DhcpClient {
                program: PathBuf::from(&dhcp.client),
                script: None,
            };
        }
        if !dhcp.script.is_empty() {
            settings.dhcp.script = Some(PathBuf::from(&dhcp.script));
        }
        if dhcp.wait_secs != 0 {
            settings.timing.dhcp_attempts = dhcp.wait_secs;
        }

        let pairing = &config.pairing;
        if !pairing.device_marker.is_empty() {
            settings.device_marker = pairing.device_marker.clone();
        }
        if pairing.credential_wait_secs != 0 {
            settings.timing.credential_attempts = pairing.credential_wait_secs;
        }
        if pairing.scan_retry_secs != 0 {
            settings.timing.scan_retry = Duration::from_secs(u64::from(pairing.scan_retry_secs));
        }

        if !config.console.address.is_empty() {
            settings.console = parse_ipv4("console.address", &config.console.address)?;
        }
        if !config.console.gateway.is_empty() {
            settings.gateway = parse_ipv4("console.gateway", &config.console.gateway)?;
        }

        let bridge = &config.bridge;
        if bridge.helper_port != 0 {
            settings.bridge_helper_port = bridge.helper_port;
        }
        if bridge.client_port != 0 {
            settings.bridge_client_port = bridge.client_port;
        }
        if settings.bridge_helper_port == settings.bridge_client_port {
            return Err(ConfigError::InvalidValue {
                field: "bridge.client_port".to_string(),
                message: "must differ from bridge.helper_port".to_string(),
            });
        }
        if bridge.ack_timeout_ms != 0 {
            settings.bridge_ack_timeout = Duration::from_millis(u64::from(bridge.ack_timeout_ms));
        }

        if !config.storage.state_dir.is_empty() {
            settings.state_dir = PathBuf::from(&config.storage.state_dir);
        }

        Ok(settings)
    }

    /// Config the supplicant runs with while pairing. Receives credentials.
    pub fn authenticate_config_path(&self) -> PathBuf {
        self.state_dir.join(AUTHENTICATE_CONFIG_FILE)
    }

    /// Config the supplicant runs with when connecting. The pairing artifact.
    pub fn connect_config_path(&self) -> PathBuf {
        self.state_dir.join(CONNECT_CONFIG_FILE)
    }

    /// Control socket for `interface`.
    pub fn ctrl_socket_path(&self, interface: &str) -> PathBuf {
        self.ctrl_dir.join(interface)
    }

    /// Bridge settings for a helper at `helper`.
    pub fn bridge(&self, helper: Ipv4Addr) -> BridgeSettings {
        BridgeSettings {
            helper_port: self.bridge_helper_port,
            client_port: self.bridge_client_port,
            ack_timeout: self.bridge_ack_timeout,
            ..BridgeSettings::new(helper)
        }
    }
}

fn parse_ipv4(field: &str, value: &str) -> Result<Ipv4Addr, ConfigError> {
    value.parse().map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("'{}' is not an IPv4 address: {}", value, e),
    })
}

/// Directory containing the running executable.
fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = LinkSettings::default();
        assert_eq!(settings.driver, "nl80211");
        assert_eq!(settings.ctrl_dir, PathBuf::from("/var/run/wpa_supplicant_drc"));
        assert_eq!(settings.device_marker, "WiiU");
        assert_eq!(settings.console, Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(settings.gateway, Ipv4Addr::new(192, 168, 1, 1));
        assert!(settings.supplicant.ends_with("wpa_supplicant_drc"));
        assert_eq!(settings.timing.credential_attempts, 20);
        assert_eq!(settings.timing.connect_poll, Duration::from_secs(2));
    }

    #[test]
    fn test_empty_config_resolves_to_defaults() {
        let settings = LinkSettings::from_config(&Config::default()).unwrap();
        assert_eq!(settings, LinkSettings::default());
    }

    #[test]
    fn test_shipped_config_resolves_to_defaults() {
        let config: Config = toml::from_str(include_str!("../../config/default.toml")).unwrap();
        let settings = LinkSettings::from_config(&config).unwrap();
        assert_eq!(settings, LinkSettings::default());
    }

    #[test]
    fn test_overrides() {
        let config: Config = toml::from_str(
            r#"
            [supplicant]
            binary = "/usr/local/bin/wpa_supplicant_drc"
            ctrl_dir = "/tmp/ctrl"

            [dhcp]
            client = "/sbin/dhclient"

            [pairing]
            credential_wait_secs = 30

            [console]
            gateway = "10.0.0.1"

            [bridge]
            ack_timeout_ms = 250

            [storage]
            state_dir = "/var/lib/padlink"
            "#,
        )
        .unwrap();

        let settings = LinkSettings::from_config(&config).unwrap();
        assert_eq!(settings.supplicant, PathBuf::from("/usr/local/bin/wpa_supplicant_drc"));
        assert_eq!(settings.ctrl_socket_path("wlan1"), PathBuf::from("/tmp/ctrl/wlan1"));
        assert_eq!(settings.dhcp.program, PathBuf::from("/sbin/dhclient"));
        assert_eq!(settings.dhcp.script, None);
        assert_eq!(settings.timing.credential_attempts, 30);
        assert_eq!(settings.gateway, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(settings.bridge_ack_timeout, Duration::from_millis(250));
        assert_eq!(
            settings.connect_config_path(),
            PathBuf::from("/var/lib/padlink/connect.conf")
        );
        assert_eq!(
            settings.authenticate_config_path(),
            PathBuf::from("/var/lib/padlink/authenticate.conf")
        );
    }

    #[test]
    fn test_invalid_address() {
        let mut config = Config::default();
        config.console.address = "192.168.1".to_string();

        let err = LinkSettings::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "console.address"));
    }

    #[test]
    fn test_bridge_ports_must_differ() {
        let mut config = Config::default();
        config.bridge.client_port = 51000;

        let err = LinkSettings::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_bridge_settings_for_helper() {
        let settings = LinkSettings::default();
        let bridge = settings.bridge(Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(bridge.helper, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(bridge.helper_port, 51000);
        assert_eq!(bridge.ports.offset, 200);
    }
}
