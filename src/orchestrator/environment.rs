//! Supplicant environment shared by pairing and connecting.
//!
//! Setup acquires, in order: the NetworkManager hand-off, the supplicant
//! process and its attached control channel. Each is owned by a value whose
//! drop undoes it, so every exit path tears down in reverse.

use std::path::Path;

use tracing::{debug, info, warn};

use super::Orchestrator;
use crate::cancel::CancelToken;
use crate::config::SUPPLICANT_NAME;
use crate::error::LinkError;
use crate::network::ManagedStateGuard;
use crate::process::{CommandSpec, ManagedProcess, MarkerWait};
use crate::supplicant::{ControlChannel, CtrlError};

/// Line the supplicant prints once it is ready for control connections.
pub const SUPPLICANT_READY: &str = "Successfully initialized wpa_supplicant";

/// A running supplicant with an attached control channel.
///
/// Dropping it detaches, closes the channel, then terminates the process.
pub struct SupplicantSession {
    ctrl: Box<dyn ControlChannel>,
    attached: bool,
    // Dropped after `ctrl`
    _process: ManagedProcess,
}

impl SupplicantSession {
    fn attach(ctrl: Box<dyn ControlChannel>, process: ManagedProcess) -> Result<Self, CtrlError> {
        let mut session = Self {
            ctrl,
            attached: false,
            _process: process,
        };
        session.ctrl.attach()?;
        session.attached = true;
        Ok(session)
    }

    /// The attached control channel.
    pub fn ctrl(&mut self) -> &mut dyn ControlChannel {
        self.ctrl.as_mut()
    }
}

impl Drop for SupplicantSession {
    fn drop(&mut self) {
        if self.attached
            && let Err(e) = self.ctrl.detach()
        {
            warn!("Failed to detach from supplicant: {}", e);
        }
    }
}

impl Orchestrator {
    /// Bring up the supplicant on `interface` with `config`, run `f`, and
    /// tear everything down again regardless of the outcome.
    pub(super) fn with_supplicant<T, F>(
        &self,
        interface: &str,
        config: &Path,
        cancel: &CancelToken,
        f: F,
    ) -> Result<T, LinkError>
    where
        F: FnOnce(&mut SupplicantSession) -> Result<T, LinkError>,
    {
        let _managed = ManagedStateGuard::acquire(self.runner.clone(), interface, self.audit.clone());

        let process = self.launch_supplicant(interface, config, cancel)?;
        let ctrl = self.open_control(interface, cancel)?;
        if cancel.is_raised() {
            return Err(LinkError::Cancelled);
        }

        let mut session = SupplicantSession::attach(ctrl, process)?;
        f(&mut session)
    }

    fn launch_supplicant(
        &self,
        interface: &str,
        config: &Path,
        cancel: &CancelToken,
    ) -> Result<ManagedProcess, LinkError> {
        let binary = &self.settings.supplicant;
        let name = binary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| SUPPLICANT_NAME.to_string());

        // Orphans from an earlier crash hold the interface
        let killall = CommandSpec::new("killall").args(["-9", name.as_str()]);
        if let Err(e) = self.runner.run(&killall) {
            debug!("killall not run: {}", e);
        }

        let spec = CommandSpec::new(binary.to_string_lossy())
            .arg(format!("-D{}", self.settings.driver))
            .args(["-i", interface, "-c"])
            .arg(config.to_string_lossy());

        let mut process = ManagedProcess::spawn(self.runner.as_ref(), &spec)?;
        let timing = &self.settings.timing;
        match process.wait_for_marker(
            SUPPLICANT_READY,
            timing.output_poll,
            timing.supplicant_attempts,
            cancel,
        )? {
            MarkerWait::Found(_) => {
                info!("Supplicant started on {} (PID {})", interface, process.id());
                Ok(process)
            }
            MarkerWait::Cancelled => Err(LinkError::Cancelled),
        }
    }

    fn open_control(
        &self,
        interface: &str,
        cancel: &CancelToken,
    ) -> Result<Box<dyn ControlChannel>, LinkError> {
        let path = self.settings.ctrl_socket_path(interface);
        loop {
            if cancel.is_raised() {
                return Err(LinkError::Cancelled);
            }

            match self.connector.open(&path) {
                Ok(ctrl) => return Ok(ctrl),
                Err(CtrlError::Unavailable { .. }) => {
                    info!("Waiting for control interface {:?}", path);
                    if !cancel.sleep(self.settings.timing.ctrl_open_retry) {
                        return Err(LinkError::Cancelled);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
