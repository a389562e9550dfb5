//! DHCP lease acquisition.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::cancel::CancelToken;
use crate::process::{CommandSpec, ManagedProcess, MarkerWait, ProcessError, ProcessRunner};

/// Line prefix dhclient writes to stderr once it holds a lease.
pub const BOUND_MARKER: &str = "bound to";

/// Which DHCP client to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpClient {
    /// Client binary.
    pub program: PathBuf,
    /// Hook script passed with `-sf`, if any.
    pub script: Option<PathBuf>,
}

impl DhcpClient {
    /// Prefer a `dhclient` bundled in `exe_dir` together with its
    /// `../sbin/dhclient-script`; otherwise use the system `dhclient`.
    pub fn locate(exe_dir: Option<&Path>) -> Self {
        if let Some(dir) = exe_dir {
            let bundled = dir.join("dhclient");
            if bundled.is_file() {
                return Self {
                    program: bundled,
                    script: Some(dir.join("../sbin/dhclient-script")),
                };
            }
        }
        Self {
            program: PathBuf::from("dhclient"),
            script: None,
        }
    }

    /// Foreground, no pid file, lease reports on stderr.
    pub fn command(&self, interface: &str) -> CommandSpec {
        let mut spec = CommandSpec::new(self.program.to_string_lossy())
            .args(["-d", "--no-pid", interface])
            .capture_stderr();
        if let Some(ref script) = self.script {
            spec = spec.arg("-sf").arg(script.to_string_lossy());
        }
        spec
    }

    /// Start the client and wait until it reports a lease.
    ///
    /// On success the returned handle keeps the lease alive; dropping it
    /// terminates the client. Returns `Ok(None)` if cancelled first.
    pub fn acquire(
        &self,
        runner: &dyn ProcessRunner,
        interface: &str,
        poll: Duration,
        attempts: u32,
        cancel: &CancelToken,
    ) -> Result<Option<ManagedProcess>, ProcessError> {
        let mut process = ManagedProcess::spawn(runner, &self.command(interface))?;
        match process.wait_for_marker(BOUND_MARKER, poll, attempts, cancel)? {
            MarkerWait::Found(line) => {
                info!("DHCP: {}", line.trim());
                Ok(Some(process))
            }
            MarkerWait::Cancelled => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::LineRead;
    use crate::process::testing::RecordingRunner;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    #[test]
    fn test_locate_system_client() {
        let dir = TempDir::new().unwrap();
        let client = DhcpClient::locate(Some(dir.path()));
        assert_eq!(client.program, PathBuf::from("dhclient"));
        assert_eq!(client.script, None);

        assert_eq!(DhcpClient::locate(None), client);
    }

    #[test]
    fn test_locate_bundled_client() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("dhclient"), b"").unwrap();

        let client = DhcpClient::locate(Some(dir.path()));
        assert_eq!(client.program, dir.path().join("dhclient"));
        assert_eq!(client.script, Some(dir.path().join("../sbin/dhclient-script")));
    }

    #[test]
    fn test_command_line() {
        let client = DhcpClient {
            program: PathBuf::from("/opt/padlink/dhclient"),
            script: Some(PathBuf::from("/opt/sbin/dhclient-script")),
        };
        let spec = client.command("wlan1");
        assert_eq!(
            spec.to_command_line(),
            "/opt/padlink/dhclient -d --no-pid wlan1 -sf /opt/sbin/dhclient-script"
        );
        assert_eq!(spec.capture, crate::process::OutputStream::Stderr);
    }

    #[test]
    fn test_acquire_waits_for_bound() {
        let runner = RecordingRunner::new().with_lines(
            "dhclient",
            vec![
                LineRead::Line("DHCPDISCOVER on wlan1 to 255.255.255.255 port 67".to_string()),
                LineRead::Idle,
                LineRead::Line("bound to 192.168.1.11 -- renewal in 1800 seconds.".to_string()),
            ],
        );
        let client = DhcpClient::locate(None);

        let lease = client
            .acquire(&runner, "wlan1", Duration::from_millis(1), 5, &CancelToken::new())
            .unwrap();
        assert!(lease.is_some());
        assert_eq!(runner.terminations.load(Ordering::SeqCst), 0);

        drop(lease);
        assert_eq!(runner.terminations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_acquire_timeout_terminates_client() {
        let runner = RecordingRunner::new();
        let client = DhcpClient::locate(None);

        let result = client.acquire(&runner, "wlan1", Duration::from_millis(1), 3, &CancelToken::new());
        assert!(matches!(result, Err(ProcessError::OutputTimeout { .. })));
        assert_eq!(runner.terminations.load(Ordering::SeqCst), 1);
    }
}
