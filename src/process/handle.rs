//! Scoped subprocess handle.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::error::ProcessError;
use super::runner::{ChildProcess, CommandSpec, LineRead, ProcessRunner};
use crate::cancel::CancelToken;

/// Outcome of [`ManagedProcess::wait_for_marker`] when it does not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerWait {
    /// A line starting with the marker was seen. Holds that line.
    Found(String),
    /// The cancellation token was raised first.
    Cancelled,
}

/// A child process that is terminated when the handle is dropped.
pub struct ManagedProcess {
    program: String,
    child: Box<dyn ChildProcess>,
}

impl ManagedProcess {
    /// Spawn `spec` through `runner`.
    pub fn spawn(runner: &dyn ProcessRunner, spec: &CommandSpec) -> Result<Self, ProcessError> {
        let child = runner.spawn(spec)?;
        Ok(Self {
            program: spec.program.clone(),
            child,
        })
    }

    /// Process id of the child.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Program this handle was started from.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Read lines until one starts with `marker` (leading whitespace ignored).
    ///
    /// The wait is bounded by `attempts` polls of `poll` length, measured on
    /// the wall clock, so a child that keeps printing non-matching lines
    /// still times out. The child is left running on every outcome; dropping
    /// the handle terminates it.
    pub fn wait_for_marker(
        &mut self,
        marker: &str,
        poll: Duration,
        attempts: u32,
        cancel: &CancelToken,
    ) -> Result<MarkerWait, ProcessError> {
        let deadline = Instant::now() + poll * attempts;
        loop {
            if cancel.is_raised() {
                return Ok(MarkerWait::Cancelled);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ProcessError::OutputTimeout {
                    program: self.program.clone(),
                    marker: marker.to_string(),
                });
            }

            match self.child.read_line(remaining.min(poll)) {
                LineRead::Line(line) => {
                    if line.trim_start().starts_with(marker) {
                        debug!("{} reported: {}", self.program, line);
                        return Ok(MarkerWait::Found(line));
                    }
                }
                LineRead::Idle => {}
                LineRead::Closed => {
                    return Err(ProcessError::OutputClosed {
                        program: self.program.clone(),
                        marker: marker.to_string(),
                    });
                }
            }
        }
    }

    /// Terminate the child now rather than at drop.
    pub fn terminate(&mut self) -> Result<(), ProcessError> {
        self.child.terminate()
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        debug!("Terminating {} (PID {})", self.program, self.child.id());
        if let Err(e) = self.child.terminate() {
            warn!("Failed to terminate {}: {}", self.program, e);
        }
    }
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("program", &self.program)
            .field("pid", &self.child.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::process::SystemRunner;
    use crate::process::testing::RecordingRunner;

    fn line(s: &str) -> LineRead {
        LineRead::Line(s.to_string())
    }

    #[test]
    fn test_marker_found_after_noise() {
        let runner = RecordingRunner::new().with_lines(
            "supp",
            vec![
                line("rfkill: Cannot open RFKILL control device"),
                LineRead::Idle,
                line("Successfully initialized wpa_supplicant"),
            ],
        );
        let mut proc = ManagedProcess::spawn(&runner, &CommandSpec::new("supp")).unwrap();

        let result = proc
            .wait_for_marker(
                "Successfully initialized wpa_supplicant",
                Duration::from_millis(1),
                5,
                &CancelToken::new(),
            )
            .unwrap();
        assert_eq!(
            result,
            MarkerWait::Found("Successfully initialized wpa_supplicant".to_string())
        );
    }

    #[test]
    fn test_marker_timeout_after_idle_attempts() {
        let runner = RecordingRunner::new();
        let mut proc = ManagedProcess::spawn(&runner, &CommandSpec::new("dhclient")).unwrap();

        let result = proc.wait_for_marker("bound to", Duration::from_millis(1), 3, &CancelToken::new());
        assert!(matches!(result, Err(ProcessError::OutputTimeout { .. })));
    }

    #[test]
    fn test_marker_timeout_while_child_keeps_printing() {
        let runner = RecordingRunner::new().with_chatter("dhclient", "DHCPDISCOVER on wlan1");
        let mut proc = ManagedProcess::spawn(&runner, &CommandSpec::new("dhclient")).unwrap();

        let start = Instant::now();
        let result = proc.wait_for_marker("bound to", Duration::from_millis(20), 3, &CancelToken::new());
        assert!(matches!(result, Err(ProcessError::OutputTimeout { .. })));
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_marker_timeout_with_chatty_system_child() {
        let spec = CommandSpec::new("sh").args(["-c", "while :; do echo chatter; sleep 0.05; done"]);
        let mut proc = ManagedProcess::spawn(&SystemRunner::new(), &spec).unwrap();

        let start = Instant::now();
        let result = proc.wait_for_marker("bound to", Duration::from_millis(200), 3, &CancelToken::new());
        assert!(matches!(result, Err(ProcessError::OutputTimeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_marker_stream_closed() {
        let runner = RecordingRunner::new()
            .with_lines("dhclient", vec![line("starting"), LineRead::Closed]);
        let mut proc = ManagedProcess::spawn(&runner, &CommandSpec::new("dhclient")).unwrap();

        let result = proc.wait_for_marker("bound to", Duration::from_millis(1), 3, &CancelToken::new());
        assert!(matches!(result, Err(ProcessError::OutputClosed { .. })));
    }

    #[test]
    fn test_marker_wait_cancelled() {
        let runner = RecordingRunner::new();
        let mut proc = ManagedProcess::spawn(&runner, &CommandSpec::new("dhclient")).unwrap();

        let cancel = CancelToken::new();
        cancel.raise();
        let result = proc
            .wait_for_marker("bound to", Duration::from_millis(1), 3, &cancel)
            .unwrap();
        assert_eq!(result, MarkerWait::Cancelled);
    }

    #[test]
    fn test_drop_terminates_child() {
        let runner = RecordingRunner::new();
        {
            let proc = ManagedProcess::spawn(&runner, &CommandSpec::new("supp")).unwrap();
            assert_eq!(proc.id(), 1000);
            assert_eq!(proc.program(), "supp");
        }
        assert_eq!(runner.terminations.load(Ordering::SeqCst), 1);
    }
}
