//! Bridged transport.
//!
//! When the radio is owned by a privileged helper process, the session runs
//! unprivileged on shifted ports and the helper relays traffic to the
//! console. A small command exchange on a fixed port pair claims the helper:
//!
//! ```text
//! client (client_port)                 helper (helper_port)
//!   │── BIND ──────────────────────────▶│
//!   │◀──────────────────────── BIND_ACK ─│   resent every ack_timeout until acked
//!   │            ... session ...         │
//!   │── UNBIND ────────────────────────▶│   sent once, not acknowledged
//! ```
//!
//! Codes are 4-byte big-endian integers.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::channel::PortPlan;
use super::error::TransportError;
use super::Transport;
use crate::cancel::CancelToken;

/// Helper command port.
pub const DEFAULT_HELPER_PORT: u16 = 51000;

/// Client command port.
pub const DEFAULT_CLIENT_PORT: u16 = 51001;

/// How long to wait for BIND_ACK before resending BIND.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Command codes exchanged with the helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ControlCode {
    /// Claim the helper for this client.
    Bind = 1,
    /// Helper accepted the claim.
    BindAck = 2,
    /// Release the helper.
    Unbind = 3,
}

impl ControlCode {
    /// Wire form.
    pub fn encode(self) -> [u8; 4] {
        (self as u32).to_be_bytes()
    }

    /// Parse a datagram. Anything but exactly four bytes of a known code is
    /// rejected.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 4] = bytes.try_into().ok()?;
        match u32::from_be_bytes(raw) {
            1 => Some(Self::Bind),
            2 => Some(Self::BindAck),
            3 => Some(Self::Unbind),
            _ => None,
        }
    }
}

/// Settings for [`BridgedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Address of the helper; also where channel traffic is sent.
    pub helper: Ipv4Addr,
    /// Helper command port.
    pub helper_port: u16,
    /// Local command port.
    pub client_port: u16,
    /// Wait for BIND_ACK before resending.
    pub ack_timeout: Duration,
    /// Channel port plan.
    pub ports: PortPlan,
}

impl BridgeSettings {
    /// Standard ports for a helper at `helper`.
    pub fn new(helper: Ipv4Addr) -> Self {
        Self {
            helper,
            helper_port: DEFAULT_HELPER_PORT,
            client_port: DEFAULT_CLIENT_PORT,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            ports: PortPlan::BRIDGED,
        }
    }
}

/// Transport that binds the helper before opening channels.
#[derive(Debug)]
pub struct BridgedTransport {
    settings: BridgeSettings,
    socket: Option<UdpSocket>,
}

impl BridgedTransport {
    /// Create an unbound transport.
    pub fn new(settings: BridgeSettings) -> Self {
        Self {
            settings,
            socket: None,
        }
    }

    fn helper_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.settings.helper, self.settings.helper_port)
    }

    fn open_command_socket(&self) -> Result<UdpSocket, TransportError> {
        let port = self.settings.client_port;
        let command_err = |source| TransportError::CommandSocket { port, source };

        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).map_err(command_err)?;
        socket
            .set_read_timeout(Some(self.settings.ack_timeout))
            .map_err(command_err)?;
        Ok(socket)
    }

    /// Send BIND until the helper acknowledges or `cancel` is raised.
    ///
    /// Replies from any address other than the helper's command port are
    /// ignored.
    fn bind(&self, socket: &UdpSocket, cancel: &CancelToken) -> Result<(), TransportError> {
        let helper = self.helper_addr();
        let mut buf = [0u8; 16];
        let mut attempts = 0u32;

        loop {
            if cancel.is_raised() {
                return Err(TransportError::Cancelled);
            }

            attempts += 1;
            if let Err(e) = socket.send_to(&ControlCode::Bind.encode(), helper) {
                debug!("BIND to {} failed: {}", helper, e);
            }

            match socket.recv_from(&mut buf) {
                Ok((_, from)) if from != SocketAddr::V4(helper) => {
                    debug!("Ignoring bridge datagram from {}", from);
                }
                Ok((len, _)) => match ControlCode::decode(&buf[..len]) {
                    Some(ControlCode::BindAck) => {
                        info!("Bridge helper {} bound after {} attempt(s)", helper, attempts);
                        return Ok(());
                    }
                    other => debug!("Ignoring bridge reply {:?}", other),
                },
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    debug!("No BIND_ACK from {}, resending", helper);
                }
                Err(e) => {
                    debug!("Bridge command socket error: {}", e);
                    // ECONNREFUSED returns immediately
                    cancel.sleep(self.settings.ack_timeout);
                }
            }
        }
    }
}

impl Transport for BridgedTransport {
    fn name(&self) -> &'static str {
        "bridged"
    }

    fn ports(&self) -> PortPlan {
        self.settings.ports
    }

    fn console_address(&self) -> Ipv4Addr {
        self.settings.helper
    }

    fn prepare(&mut self, cancel: &CancelToken) -> Result<(), TransportError> {
        let socket = self.open_command_socket()?;
        self.bind(&socket, cancel)?;
        self.socket = Some(socket);
        Ok(())
    }

    /// Release the helper. The helper does not acknowledge UNBIND, so a lost
    /// datagram leaves it bound until its own timeout.
    fn finish(&mut self) {
        if let Some(ref socket) = self.socket
            && let Err(e) = socket.send_to(&ControlCode::Unbind.encode(), self.helper_addr())
        {
            warn!("Failed to send UNBIND to bridge helper: {}", e);
        }
    }
}
