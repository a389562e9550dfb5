//! Configuration system for padlink.
//!
//! TOML files are loaded and merged by [`ConfigLoader`] into a [`Config`],
//! which is then resolved into typed [`LinkSettings`] with built-in defaults
//! for anything left unset.
//!
//! # Configuration Hierarchy
//!
//! 1. System config: `/etc/padlink/config.toml`
//! 2. User config: `~/.config/padlink/config.toml`
//! 3. Additional config file (via `--config` flag)
//!
//! No file is required.
//!
//! ```toml
//! [supplicant]
//! driver = "nl80211"
//! ctrl_dir = "/var/run/wpa_supplicant_drc"
//!
//! [pairing]
//! device_marker = "WiiU"
//! ```

mod error;
mod loader;
mod schema;
mod settings;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    BridgeConfig, Config, ConsoleConfig, DhcpConfig, GeneralConfig, PairingConfig, StorageConfig,
    SupplicantConfig,
};
pub use settings::{LinkSettings, Timing, SUPPLICANT_NAME};
