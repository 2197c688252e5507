//! Test doubles shared by the unit tests.

use crate::exec::{CapturedOutput, CommandRunner, CommandSpec, ExecError, ExecutionResult};
use crate::ui::OutputSink;
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Stdout(String),
    Stderr(String),
    Message(String),
    Warn(String),
    Error(String),
}

/// Records everything written to it.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SinkEvent>>,
}

impl MemorySink {
    fn push(&self, event: SinkEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn stdout_lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Stdout(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn stderr_lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Stderr(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Message(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Error(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Every message, warning and error joined into one string.
    pub fn text(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Message(s) | SinkEvent::Warn(s) | SinkEvent::Error(s) => Some(s),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OutputSink for MemorySink {
    fn stdout_line(&self, line: &str) {
        self.push(SinkEvent::Stdout(line.to_string()));
    }
    fn stderr_line(&self, line: &str) {
        self.push(SinkEvent::Stderr(line.to_string()));
    }
    fn message(&self, msg: &str) {
        self.push(SinkEvent::Message(msg.to_string()));
    }
    fn warn(&self, msg: &str) {
        self.push(SinkEvent::Warn(msg.to_string()));
    }
    fn error(&self, msg: &str) {
        self.push(SinkEvent::Error(msg.to_string()));
    }
}

/// What a faked command does.
#[derive(Debug, Clone, Default)]
pub struct FakeOutcome {
    pub exit_code: i32,
    pub stdout: String,
}

impl FakeOutcome {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            stdout: String::new(),
        }
    }

    pub fn stdout(text: &str) -> Self {
        Self {
            exit_code: 0,
            stdout: text.to_string(),
        }
    }
}

type Handler = Box<dyn Fn(&CommandSpec) -> Result<FakeOutcome, ExecError> + Send + Sync>;

/// A [`CommandRunner`] that records every command and answers from a handler
/// instead of spawning anything.
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    handler: Handler,
}

impl RecordingRunner {
    /// Every command succeeds with no output.
    pub fn succeeding() -> Self {
        Self::with_handler(|_| Ok(FakeOutcome::ok()))
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<FakeOutcome, ExecError> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered command lines, in call order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::display).collect()
    }

    fn answer(&self, spec: &CommandSpec) -> Result<FakeOutcome, ExecError> {
        self.calls.lock().unwrap().push(spec.clone());
        (self.handler)(spec)
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ExecutionResult, ExecError> {
        let outcome = self.answer(spec)?;
        Ok(ExecutionResult {
            success: outcome.exit_code == 0,
            exit_code: Some(outcome.exit_code),
            log_file: spec.log_file.clone(),
        })
    }

    async fn capture(&self, spec: &CommandSpec) -> Result<CapturedOutput, ExecError> {
        let outcome = self.answer(spec)?;
        Ok(CapturedOutput {
            success: outcome.exit_code == 0,
            exit_code: Some(outcome.exit_code),
            stdout: outcome.stdout,
        })
    }
}

/// Write an executable file (mode 0755) with the given contents.
pub fn write_executable(path: &std::path::Path, contents: &str) {
    use std::os::unix::fs::PermissionsExt;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}
