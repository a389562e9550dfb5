//! Routing table adjustments.

use std::net::Ipv4Addr;

use tracing::{debug, warn};

use crate::process::{CommandSpec, ProcessRunner};

/// Drop the default route the console's DHCP server hands out, so the host
/// keeps its regular uplink. Failure is logged and otherwise ignored.
pub fn remove_default_route(runner: &dyn ProcessRunner, gateway: Ipv4Addr, interface: &str) -> bool {
    let spec = CommandSpec::new("ip")
        .args(["route", "del", "default", "via"])
        .arg(gateway.to_string())
        .args(["dev", interface])
        .capture_stderr();

    match runner.run(&spec).and_then(|output| output.check(&spec)) {
        Ok(_) => {
            debug!("Removed default route via {} on {}", gateway, interface);
            true
        }
        Err(e) => {
            warn!("Failed to remove default route: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::RecordingRunner;

    #[test]
    fn test_remove_default_route_command() {
        let runner = RecordingRunner::new();
        assert!(remove_default_route(&runner, Ipv4Addr::new(192, 168, 1, 1), "wlan1"));
        assert_eq!(
            runner.command_lines(),
            vec!["ip route del default via 192.168.1.1 dev wlan1"]
        );
    }

    #[test]
    fn test_failure_is_not_fatal() {
        let runner = RecordingRunner::new().with_output("ip", false, "RTNETLINK answers: No such process");
        assert!(!remove_default_route(&runner, Ipv4Addr::new(192, 168, 1, 1), "wlan1"));
    }
}
