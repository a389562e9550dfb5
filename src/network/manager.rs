//! NetworkManager hand-off.
//!
//! While the supplicant owns the interface, NetworkManager must leave it
//! alone. [`ManagedStateGuard`] releases the interface on acquisition and hands
//! it back when dropped.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::process::{CommandSpec, ProcessError, ProcessRunner};
use crate::telemetry::{AuditEvent, AuditLogger};

const NMCLI: &str = "nmcli";

/// Whether NetworkManager currently manages `interface`.
///
/// A missing or failing `nmcli` counts as unmanaged.
pub fn is_managed(runner: &dyn ProcessRunner, interface: &str) -> bool {
    let spec = CommandSpec::new(NMCLI).args(["device", "show", interface]);
    match runner.run(&spec) {
        Ok(output) => parse_general_state(&output.text).unwrap_or(false),
        Err(e) => {
            debug!("Could not query NetworkManager, assuming unmanaged: {}", e);
            false
        }
    }
}

/// Read the managed state from `nmcli device show` output.
fn parse_general_state(text: &str) -> Option<bool> {
    text.lines()
        .find(|line| line.starts_with("GENERAL.STATE"))
        .map(|line| !line.contains("unmanaged"))
}

/// Ask NetworkManager to manage or release `interface`.
pub fn set_managed(
    runner: &dyn ProcessRunner,
    interface: &str,
    managed: bool,
) -> Result<(), ProcessError> {
    let spec = CommandSpec::new(NMCLI).args([
        "device",
        "set",
        interface,
        "managed",
        if managed { "on" } else { "off" },
    ]);
    runner.run(&spec)?.check(&spec)?;
    Ok(())
}

/// Releases an interface from NetworkManager for as long as it lives.
pub struct ManagedStateGuard {
    runner: Arc<dyn ProcessRunner>,
    interface: String,
    restore: bool,
    audit: Option<Arc<AuditLogger>>,
}

impl ManagedStateGuard {
    /// Release `interface` if NetworkManager currently manages it.
    ///
    /// Failure to release is logged and bring-up continues; the interface is
    /// still handed back on drop.
    pub fn acquire(
        runner: Arc<dyn ProcessRunner>,
        interface: &str,
        audit: Option<Arc<AuditLogger>>,
    ) -> Self {
        let restore = is_managed(runner.as_ref(), interface);

        if restore {
            match set_managed(runner.as_ref(), interface, false) {
                Ok(()) => {
                    info!("Temporarily set {} to unmanaged", interface);
                    if let Some(ref audit) = audit {
                        audit.log(AuditEvent::ManagedStateChanged {
                            interface: interface.to_string(),
                            managed: false,
                        });
                    }
                }
                Err(e) => warn!(
                    "Failed to set {} to unmanaged, results may be unpredictable: {}",
                    interface, e
                ),
            }
        }

        Self {
            runner,
            interface: interface.to_string(),
            restore,
            audit,
        }
    }

    /// Whether the interface will be handed back on drop.
    pub fn will_restore(&self) -> bool {
        self.restore
    }
}

impl Drop for ManagedStateGuard {
    fn drop(&mut self) {
        if !self.restore {
            return;
        }

        info!("Setting {} back to managed", self.interface);
        match set_managed(self.runner.as_ref(), &self.interface, true) {
            Ok(()) => {
                if let Some(ref audit) = self.audit {
                    audit.log(AuditEvent::ManagedStateChanged {
                        interface: self.interface.clone(),
                        managed: true,
                    });
                }
            }
            Err(e) => warn!("Failed to restore managed state of {}: {}", self.interface, e),
        }
    }
}
