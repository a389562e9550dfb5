//! Launching external programs.
//!
//! [`ProcessRunner`] is the seam between the bring-up automaton and the
//! operating system. [`SystemRunner`] is the real implementation; tests
//! substitute scripted runners.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{debug, trace, warn};

use super::error::ProcessError;

/// How long a terminated child gets to exit before it is killed outright.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Which output stream of a child is captured as its line stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStream {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error (dhclient reports its lease here).
    Stderr,
}

/// Argument-vector description of a program to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path.
    pub program: String,
    /// Arguments, not including the program itself.
    pub args: Vec<String>,
    /// Stream exposed as the line stream.
    pub capture: OutputStream,
}

impl CommandSpec {
    /// Start a spec for `program` with no arguments, capturing stdout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            capture: OutputStream::Stdout,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Capture standard error instead of standard output.
    pub fn capture_stderr(mut self) -> Self {
        self.capture = OutputStream::Stderr;
        self
    }

    /// Render as a shell-like line for logging.
    pub fn to_command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Result of running a program to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Whether the program exited with status zero.
    pub success: bool,
    /// Exit code, if the program exited normally.
    pub code: Option<i32>,
    /// Text of the captured stream.
    pub text: String,
}

impl ProcessOutput {
    /// Turn an unsuccessful exit into [`ProcessError::Failed`].
    pub fn check(self, spec: &CommandSpec) -> Result<Self, ProcessError> {
        if self.success {
            Ok(self)
        } else {
            Err(ProcessError::Failed {
                command: spec.to_command_line(),
                code: self.code,
                output: self.text.trim().to_string(),
            })
        }
    }
}

/// One poll of a child's line stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// A complete line, without its terminator.
    Line(String),
    /// Nothing arrived within the poll interval.
    Idle,
    /// The stream is closed; the child has exited or closed it.
    Closed,
}

/// A running child process.
pub trait ChildProcess: Send {
    /// Operating-system process id.
    fn id(&self) -> u32;

    /// Wait up to `timeout` for the next output line.
    fn read_line(&mut self, timeout: Duration) -> LineRead;

    /// Send SIGTERM and reap the child. Safe to call more than once.
    fn terminate(&mut self) -> Result<(), ProcessError>;
}

/// Launches external programs.
pub trait ProcessRunner: Send + Sync {
    /// Start `spec` in the background.
    fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn ChildProcess>, ProcessError>;

    /// Run `spec` to completion and collect its captured stream.
    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError>;
}

/// [`ProcessRunner`] backed by `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    /// Create a system runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemRunner {
    fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn ChildProcess>, ProcessError> {
        debug!("Spawning: {}", spec.to_command_line());

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).stdin(Stdio::null());
        match spec.capture {
            OutputStream::Stdout => cmd.stdout(Stdio::piped()).stderr(Stdio::null()),
            OutputStream::Stderr => cmd.stdout(Stdio::null()).stderr(Stdio::piped()),
        };

        let launch_err = |source| ProcessError::Launch {
            program: spec.program.clone(),
            source,
        };

        let mut child = cmd.spawn().map_err(launch_err)?;
        let stream: Box<dyn Read + Send> = match spec.capture {
            OutputStream::Stdout => match child.stdout.take() {
                Some(out) => Box::new(out),
                None => return Err(launch_err(std::io::Error::other("stdout not piped"))),
            },
            OutputStream::Stderr => match child.stderr.take() {
                Some(err) => Box::new(err),
                None => return Err(launch_err(std::io::Error::other("stderr not piped"))),
            },
        };

        let lines = match spawn_line_reader(stream, &spec.program) {
            Ok(lines) => lines,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(launch_err(e));
            }
        };

        let pid = child.id();
        debug!("{} started with PID {}", spec.program, pid);

        Ok(Box::new(SystemChild {
            child,
            pid,
            lines,
            reaped: false,
        }))
    }

    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        debug!("Running: {}", spec.to_command_line());

        let output = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ProcessError::Launch {
                program: spec.program.clone(),
                source,
            })?;

        let captured = match spec.capture {
            OutputStream::Stdout => &output.stdout,
            OutputStream::Stderr => &output.stderr,
        };

        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code(),
            text: String::from_utf8_lossy(captured).into_owned(),
        })
    }
}

/// Child started by [`SystemRunner`].
struct SystemChild {
    child: Child,
    pid: u32,
    lines: Receiver<String>,
    reaped: bool,
}

impl ChildProcess for SystemChild {
    fn id(&self) -> u32 {
        self.pid
    }

    fn read_line(&mut self, timeout: Duration) -> LineRead {
        match self.lines.recv_timeout(timeout) {
            Ok(line) => LineRead::Line(line),
            Err(RecvTimeoutError::Timeout) => LineRead::Idle,
            Err(RecvTimeoutError::Disconnected) => LineRead::Closed,
        }
    }

    fn terminate(&mut self) -> Result<(), ProcessError> {
        if self.reaped {
            return Ok(());
        }

        match kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(source) => return Err(ProcessError::Signal { pid: self.pid, source }),
        }

        let deadline = Instant::now() + TERMINATE_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Process {} exited: {}", self.pid, status);
                    break;
                }
                Ok(None) if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(20));
                }
                Ok(None) => {
                    warn!("Process {} ignored SIGTERM, killing", self.pid);
                    let _ = self.child.kill();
                    self.child.wait().map_err(|source| ProcessError::Wait {
                        pid: self.pid,
                        source,
                    })?;
                    break;
                }
                Err(source) => return Err(ProcessError::Wait { pid: self.pid, source }),
            }
        }

        self.reaped = true;
        Ok(())
    }
}

/// Forward every line of `stream` into a channel from a dedicated thread.
///
/// The thread keeps draining after the receiver is gone so the child never
/// blocks on a full pipe.
fn spawn_line_reader(
    stream: Box<dyn Read + Send>,
    program: &str,
) -> std::io::Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    let name = program.rsplit('/').next().unwrap_or(program).to_string();

    thread::Builder::new()
        .name(format!("{}-output", name))
        .spawn(move || {
            let reader = BufReader::new(stream);
            for chunk in reader.split(b'\n') {
                let Ok(bytes) = chunk else { break };
                let line = String::from_utf8_lossy(&bytes)
                    .trim_end_matches('\r')
                    .to_string();
                trace!("[{}] {}", name, line);
                let _ = tx.send(line);
            }
        })?;

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("ip")
            .args(["route", "del", "default"])
            .arg("dev")
            .arg("wlan0");

        assert_eq!(spec.program, "ip");
        assert_eq!(spec.args, vec!["route", "del", "default", "dev", "wlan0"]);
        assert_eq!(spec.capture, OutputStream::Stdout);
        assert_eq!(spec.to_command_line(), "ip route del default dev wlan0");
    }

    #[test]
    fn test_capture_stderr() {
        let spec = CommandSpec::new("dhclient").capture_stderr();
        assert_eq!(spec.capture, OutputStream::Stderr);
        assert_eq!(spec.to_command_line(), "dhclient");
    }

    #[test]
    fn test_run_collects_stdout() {
        let spec = CommandSpec::new("sh").args(["-c", "echo GENERAL.STATE: 100"]);
        let output = SystemRunner::new().run(&spec).unwrap();

        assert!(output.success);
        assert_eq!(output.code, Some(0));
        assert!(output.text.contains("GENERAL.STATE"));
    }

    #[test]
    fn test_run_reports_failure_status() {
        let spec = CommandSpec::new("sh").args(["-c", "exit 3"]);
        let output = SystemRunner::new().run(&spec).unwrap();

        assert!(!output.success);
        assert_eq!(output.code, Some(3));
    }

    #[test]
    fn test_check_failed_output() {
        let spec = CommandSpec::new("ip").args(["route", "del", "default"]);
        let output = ProcessOutput {
            success: false,
            code: Some(2),
            text: "RTNETLINK answers: No such process\n".to_string(),
        };

        match output.check(&spec) {
            Err(ProcessError::Failed { command, code, output }) => {
                assert_eq!(command, "ip route del default");
                assert_eq!(code, Some(2));
                assert_eq!(output, "RTNETLINK answers: No such process");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_run_missing_program() {
        let spec = CommandSpec::new("/definitely/not/a/program-12345");
        let result = SystemRunner::new().run(&spec);
        assert!(matches!(result, Err(ProcessError::Launch { .. })));
    }

    #[test]
    fn test_spawn_reads_lines_then_closes() {
        let spec = CommandSpec::new("sh").args(["-c", "echo first; echo second"]);
        let mut child = SystemRunner::new().spawn(&spec).unwrap();

        let timeout = Duration::from_secs(5);
        assert_eq!(child.read_line(timeout), LineRead::Line("first".to_string()));
        assert_eq!(child.read_line(timeout), LineRead::Line("second".to_string()));
        assert_eq!(child.read_line(timeout), LineRead::Closed);
        child.terminate().unwrap();
    }

    #[test]
    fn test_spawn_captures_stderr() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo 'bound to 192.168.1.11' >&2"])
            .capture_stderr();
        let mut child = SystemRunner::new().spawn(&spec).unwrap();

        assert_eq!(
            child.read_line(Duration::from_secs(5)),
            LineRead::Line("bound to 192.168.1.11".to_string())
        );
        child.terminate().unwrap();
    }

    #[test]
    fn test_terminate_long_running_child() {
        let spec = CommandSpec::new("sleep").arg("30");
        let mut child = SystemRunner::new().spawn(&spec).unwrap();

        assert_eq!(child.read_line(Duration::from_millis(50)), LineRead::Idle);

        let start = Instant::now();
        child.terminate().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));

        // Second call is a no-op
        child.terminate().unwrap();
    }
}
