use crate::exec::multiplex::tee_output;
use crate::exec::{CapturedOutput, CommandRunner, CommandSpec, ExecError, ExecutionResult};
use crate::ui::OutputSink;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// Runs commands as real child processes.
///
/// Output policy, per command:
/// - verbose with a log file: stdout and stderr are relayed live to the sink
///   and written to the log
/// - quiet with a log file: both streams go straight into the log
/// - no log file: the child inherits this process's streams
pub struct ProcessExecutor {
    verbose: bool,
    sink: Arc<dyn OutputSink>,
}

impl ProcessExecutor {
    pub fn new(verbose: bool, sink: Arc<dyn OutputSink>) -> Self {
        Self { verbose, sink }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        spec.env.apply(&mut cmd);
        cmd
    }

    fn spawn_error(spec: &CommandSpec, source: std::io::Error) -> ExecError {
        ExecError::Spawn {
            program: spec.program.clone(),
            source,
        }
    }

    fn wait_error(spec: &CommandSpec, source: std::io::Error) -> ExecError {
        ExecError::Wait {
            program: spec.program.clone(),
            source,
        }
    }

    fn create_log(path: &Path) -> Result<std::fs::File, ExecError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ExecError::LogFile {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::File::create(path).map_err(|source| ExecError::LogFile {
            path: path.to_path_buf(),
            source,
        })
    }

    async fn run_teed(&self, spec: &CommandSpec, log_path: &Path) -> Result<ExecutionResult, ExecError> {
        let log = Self::create_log(log_path)?;
        let mut child = Self::command(spec)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;

        let status = tee_output(
            &mut child,
            &spec.program,
            tokio::fs::File::from_std(log),
            log_path,
            self.sink.clone(),
        )
        .await?;
        Ok(ExecutionResult::from_status(status, Some(log_path.to_path_buf())))
    }

    async fn run_logged(&self, spec: &CommandSpec, log_path: &Path) -> Result<ExecutionResult, ExecError> {
        let log = Self::create_log(log_path)?;
        let log_err = log.try_clone().map_err(|source| ExecError::LogFile {
            path: log_path.to_path_buf(),
            source,
        })?;
        let mut child = Self::command(spec)
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;

        let status = child.wait().await.map_err(|e| Self::wait_error(spec, e))?;
        Ok(ExecutionResult::from_status(status, Some(log_path.to_path_buf())))
    }

    async fn run_inherited(&self, spec: &CommandSpec) -> Result<ExecutionResult, ExecError> {
        let mut child = Self::command(spec)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;

        let status = child.wait().await.map_err(|e| Self::wait_error(spec, e))?;
        Ok(ExecutionResult::from_status(status, None))
    }
}

#[async_trait]
impl CommandRunner for ProcessExecutor {
    async fn run(&self, spec: &CommandSpec) -> Result<ExecutionResult, ExecError> {
        tracing::info!(command = %spec.display(), cwd = ?spec.cwd, "running");
        let result = match (&spec.log_file, self.verbose) {
            (Some(log), true) => self.run_teed(spec, log).await,
            (Some(log), false) => self.run_logged(spec, log).await,
            (None, _) => self.run_inherited(spec).await,
        }?;
        tracing::debug!(
            program = %spec.program,
            exit_code = ?result.exit_code,
            success = result.success,
            "command finished"
        );
        Ok(result)
    }

    async fn capture(&self, spec: &CommandSpec) -> Result<CapturedOutput, ExecError> {
        tracing::debug!(command = %spec.display(), "capturing");
        let output = Self::command(spec)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Self::spawn_error(spec, e))?;

        Ok(CapturedOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::EnvOverlay;
    use crate::testutil::MemorySink;
    use tempfile::tempdir;

    fn executor(verbose: bool) -> (ProcessExecutor, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        (ProcessExecutor::new(verbose, sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_quiet_run_interleaves_into_log() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("logs").join("configure.log");
        let (exec, sink) = executor(false);

        let spec = CommandSpec::new("sh")
            .args(["-c", "echo to-out; echo to-err >&2"])
            .log_to(&log);
        let result = exec.run(&spec).await.unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.log_file.as_deref(), Some(log.as_path()));
        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("to-out"));
        assert!(content.contains("to-err"));
        assert!(sink.stdout_lines().is_empty());
    }

    #[tokio::test]
    async fn test_verbose_run_relays_and_logs() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("build.log");
        let (exec, sink) = executor(true);

        let spec = CommandSpec::new("sh")
            .args(["-c", "echo hello; echo warning >&2; exit 2"])
            .log_to(&log);
        let result = exec.run(&spec).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(2));
        assert_eq!(sink.stdout_lines(), vec!["hello"]);
        assert_eq!(sink.stderr_lines(), vec!["warning"]);
        assert_eq!(std::fs::read_to_string(&log).unwrap().lines().count(), 2);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let (exec, _sink) = executor(false);
        let spec = CommandSpec::new("definitely-not-a-real-program-xyz");
        let err = exec.run(&spec).await.unwrap_err();
        assert!(matches!(err, ExecError::Spawn { ref program, .. } if program == "definitely-not-a-real-program-xyz"));
    }

    #[tokio::test]
    async fn test_overlay_and_cwd_are_applied() {
        let dir = tempdir().unwrap();
        let (exec, _sink) = executor(false);
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo \"$MARKER\"; pwd"])
            .current_dir(dir.path())
            .env(EnvOverlay::new().with_var("MARKER", "overlay-value"));

        let out = exec.capture(&spec).await.unwrap();
        assert!(out.success);
        let mut lines = out.stdout.lines();
        assert_eq!(lines.next(), Some("overlay-value"));
        let cwd = std::path::PathBuf::from(lines.next().unwrap());
        assert_eq!(cwd.canonicalize().unwrap(), dir.path().canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_capture_reports_failure_exit() {
        let (exec, _sink) = executor(false);
        let spec = CommandSpec::new("sh").args(["-c", "exit 5"]);
        let out = exec.capture(&spec).await.unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(5));
    }
}
