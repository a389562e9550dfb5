//! Direct transport: the host talks to the console on its own radio.

use std::net::Ipv4Addr;

use super::channel::PortPlan;
use super::error::TransportError;
use super::Transport;
use crate::cancel::CancelToken;

/// Console address on its own access point.
pub const DEFAULT_CONSOLE_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);

/// Transport with no preparation step and no port offset.
#[derive(Debug, Clone)]
pub struct DirectTransport {
    console: Ipv4Addr,
    ports: PortPlan,
}

impl DirectTransport {
    /// Talk to the console at `console` on the standard ports.
    pub fn new(console: Ipv4Addr) -> Self {
        Self {
            console,
            ports: PortPlan::DIRECT,
        }
    }

    /// Use a different port plan, e.g. to run several sessions on one host.
    pub fn with_ports(mut self, ports: PortPlan) -> Self {
        self.ports = ports;
        self
    }
}

impl Default for DirectTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONSOLE_ADDRESS)
    }
}

impl Transport for DirectTransport {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn ports(&self) -> PortPlan {
        self.ports
    }

    fn console_address(&self) -> Ipv4Addr {
        self.console
    }

    fn prepare(&mut self, _cancel: &CancelToken) -> Result<(), TransportError> {
        Ok(())
    }

    fn finish(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let transport = DirectTransport::default();
        assert_eq!(transport.name(), "direct");
        assert_eq!(transport.console_address(), DEFAULT_CONSOLE_ADDRESS);
        assert_eq!(transport.ports(), PortPlan::DIRECT);
    }

    #[test]
    fn test_with_ports() {
        let transport = DirectTransport::default().with_ports(PortPlan::with_offset(7000));
        assert_eq!(transport.ports().offset, 7000);
    }
}
