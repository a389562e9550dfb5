//! In-process runner fakes for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ChildProcess, CommandSpec, LineRead, ProcessOutput, ProcessRunner};

/// Records every command and answers from per-program scripts.
///
/// Programs with no scripted output succeed with empty output; programs
/// listed in `missing` fail to launch.
#[derive(Default)]
pub(crate) struct RecordingRunner {
    pub commands: Mutex<Vec<CommandSpec>>,
    outputs: Mutex<HashMap<String, ProcessOutput>>,
    lines: Mutex<HashMap<String, Vec<LineRead>>>,
    chatter: Mutex<HashMap<String, String>>,
    missing: Mutex<Vec<String>>,
    pub terminations: Arc<AtomicUsize>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(self, program: &str, success: bool, text: &str) -> Self {
        self.outputs.lock().unwrap().insert(
            program.to_string(),
            ProcessOutput {
                success,
                code: Some(if success { 0 } else { 1 }),
                text: text.to_string(),
            },
        );
        self
    }

    pub fn with_lines(self, program: &str, lines: Vec<LineRead>) -> Self {
        self.lines.lock().unwrap().insert(program.to_string(), lines);
        self
    }

    /// Once its script runs out, `program` prints `line` on every read.
    pub fn with_chatter(self, program: &str, line: &str) -> Self {
        self.chatter
            .lock()
            .unwrap()
            .insert(program.to_string(), line.to_string());
        self
    }

    pub fn with_missing(self, program: &str) -> Self {
        self.missing.lock().unwrap().push(program.to_string());
        self
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(CommandSpec::to_command_line)
            .collect()
    }

    fn record(&self, spec: &CommandSpec) -> Result<(), ProcessError> {
        self.commands.lock().unwrap().push(spec.clone());
        if self.missing.lock().unwrap().contains(&spec.program) {
            return Err(ProcessError::Launch {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }
        Ok(())
    }
}

impl ProcessRunner for RecordingRunner {
    fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn ChildProcess>, ProcessError> {
        self.record(spec)?;
        let lines = self
            .lines
            .lock()
            .unwrap()
            .remove(&spec.program)
            .unwrap_or_default();
        let chatter = self.chatter.lock().unwrap().get(&spec.program).cloned();
        Ok(Box::new(ScriptedChild {
            lines: lines.into(),
            chatter,
            terminations: Arc::clone(&self.terminations),
        }))
    }

    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        self.record(spec)?;
        Ok(self
            .outputs
            .lock()
            .unwrap()
            .get(&spec.program)
            .cloned()
            .unwrap_or(ProcessOutput {
                success: true,
                code: Some(0),
                text: String::new(),
            }))
    }
}

struct ScriptedChild {
    lines: VecDeque<LineRead>,
    chatter: Option<String>,
    terminations: Arc<AtomicUsize>,
}

impl ChildProcess for ScriptedChild {
    fn id(&self) -> u32 {
        1000
    }

    fn read_line(&mut self, timeout: Duration) -> LineRead {
        if let Some(next) = self.lines.pop_front() {
            return next;
        }
        match &self.chatter {
            Some(line) => {
                std::thread::sleep(Duration::from_millis(1));
                LineRead::Line(line.clone())
            }
            None => {
                std::thread::sleep(timeout);
                LineRead::Idle
            }
        }
    }

    fn terminate(&mut self) -> Result<(), ProcessError> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
