//! Network bring-up: WPS pairing and connecting to the console.
//!
//! Both operations run the same environment (see [`environment`]) around
//! their own automaton:
//!
//! ```text
//!  pair:     write authenticate.conf ─▶ [env] scan ─▶ WPS_PIN ─▶ SAVE_CONFIG ─▶ connect.conf
//!  connect:  connect.conf ─▶ [env] CONNECTED ─▶ dhclient ─▶ route del ─▶ on_connected()
//!
//!  [env] = NetworkManager off ─▶ supplicant up ─▶ ctrl open + ATTACH
//! ```
//!
//! Every side effect of a call is reverted before it returns, whatever the
//! outcome. The connect config written by a successful pairing is the only
//! state that outlives the call.

mod connect;
pub mod environment;
pub mod pairing;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::cancel::CancelToken;
use crate::config::LinkSettings;
use crate::error::LinkError;
use crate::network::remove_default_route;
use crate::process::{ProcessRunner, SystemRunner};
use crate::supplicant::config_file::{authenticate_config, synthesize_connect_config, write_atomic};
use crate::supplicant::{ControlConnector, UnixConnector};
use crate::telemetry::{AuditEvent, AuditLogger};

pub use environment::{SUPPLICANT_READY, SupplicantSession};
pub use pairing::{MAX_PIN, PIN_SUFFIX};

/// Result of a successful pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingArtifact {
    /// BSSID of the console that delivered credentials.
    pub bssid: String,
    /// Supplicant config to connect with.
    pub connect_config_path: PathBuf,
}

/// Drives the supplicant, NetworkManager and DHCP to bring the link up.
pub struct Orchestrator {
    settings: LinkSettings,
    runner: Arc<dyn ProcessRunner>,
    connector: Arc<dyn ControlConnector>,
    audit: Option<Arc<AuditLogger>>,
}

impl Orchestrator {
    /// Orchestrator running real subprocesses and control sockets.
    pub fn new(settings: LinkSettings) -> Self {
        Self::with_backends(settings, Arc::new(SystemRunner::new()), Arc::new(UnixConnector))
    }

    /// Orchestrator with explicit subprocess and control socket backends.
    pub fn with_backends(
        settings: LinkSettings,
        runner: Arc<dyn ProcessRunner>,
        connector: Arc<dyn ControlConnector>,
    ) -> Self {
        Self {
            settings,
            runner,
            connector,
            audit: None,
        }
    }

    /// Record lifecycle events to `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Settings this orchestrator was built with.
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Whether a previous pairing left a connect config behind.
    pub fn has_pairing(&self) -> bool {
        self.settings.connect_config_path().is_file()
    }

    /// Pair with a console on `interface` using its 4-digit `pin`.
    ///
    /// Runs until a console accepts the PIN or `cancel` is raised. Access
    /// points that do not respond are skipped and the scan repeats.
    pub fn pair(
        &self,
        interface: &str,
        pin: u16,
        cancel: &CancelToken,
    ) -> Result<PairingArtifact, LinkError> {
        cancel.clear();
        if pin > MAX_PIN {
            return Err(LinkError::InvalidArgument {
                name: "pin",
                message: format!("{} is not a 4-digit code", pin),
            });
        }

        let auth_path = self.settings.authenticate_config_path();
        write_atomic(&auth_path, &authenticate_config(&self.settings.ctrl_dir)).map_err(|e| {
            LinkError::ConfigWrite {
                path: auth_path.clone(),
                source: e,
            }
        })?;

        info!("Pairing on {}", interface);
        self.audit(AuditEvent::PairingStarted {
            interface: interface.to_string(),
        });

        let artifact = self.with_supplicant(interface, &auth_path, cancel, |session| {
            let bssid = pairing::pair_with_console(
                session.ctrl(),
                &self.settings,
                pin,
                cancel,
                self.audit.as_deref(),
            )?;
            let connect_config_path = self.write_connect_config(&bssid)?;
            Ok(PairingArtifact {
                bssid,
                connect_config_path,
            })
        })?;

        info!("Paired with {}", artifact.bssid);
        self.audit(AuditEvent::PairingComplete {
            interface: interface.to_string(),
            bssid: artifact.bssid.clone(),
            config_path: artifact.connect_config_path.display().to_string(),
        });
        Ok(artifact)
    }

    /// Connect to the paired console on `interface`, then run
    /// `on_connected` while the link is up.
    ///
    /// The callback's result is returned once the link has been torn down.
    pub fn connect<T, F>(
        &self,
        interface: &str,
        cancel: &CancelToken,
        on_connected: F,
    ) -> Result<T, LinkError>
    where
        F: FnOnce(&CancelToken) -> Result<T, LinkError>,
    {
        cancel.clear();
        let config = self.settings.connect_config_path();
        if !config.is_file() {
            return Err(LinkError::NotPaired { path: config });
        }

        self.with_supplicant(interface, &config, cancel, |session| {
            connect::wait_for_connection(session.ctrl(), self.settings.timing.connect_poll, cancel)?;
            info!("Connected to console");
            self.audit(AuditEvent::LinkConnected {
                interface: interface.to_string(),
            });

            let timing = &self.settings.timing;
            let _lease = self
                .settings
                .dhcp
                .acquire(
                    self.runner.as_ref(),
                    interface,
                    timing.output_poll,
                    timing.dhcp_attempts,
                    cancel,
                )?
                .ok_or(LinkError::Cancelled)?;
            info!("DHCP established on {}", interface);
            self.audit(AuditEvent::DhcpBound {
                interface: interface.to_string(),
            });

            remove_default_route(self.runner.as_ref(), self.settings.gateway, interface);

            on_connected(cancel)
        })
    }

    /// Derive the connect config from the credentials the supplicant saved
    /// into the authenticate config.
    fn write_connect_config(&self, bssid: &str) -> Result<PathBuf, LinkError> {
        let auth_path = self.settings.authenticate_config_path();
        let saved = fs::read_to_string(&auth_path).map_err(|e| LinkError::ConfigWrite {
            path: auth_path,
            source: e,
        })?;

        let path = self.settings.connect_config_path();
        write_atomic(&path, &synthesize_connect_config(&saved, bssid)).map_err(|e| {
            LinkError::ConfigWrite {
                path: path.clone(),
                source: e,
            }
        })?;
        Ok(path)
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.log(event);
        }
    }
}
