//! Sequential batch execution across architectures.
//!
//! The scheduler runs one pipeline operation per architecture, in order,
//! records a [`BatchStatus`] for each, and applies the [`FailurePolicy`].
//! Per-architecture failures are folded into the [`BatchResult`]; only fatal
//! errors abort the batch.

use crate::errors::{BuildError, Stage};
use crate::pipeline::{Pipeline, PipelineState};
use crate::registry::Architecture;
use crate::ui::{BatchProgress, OutputSink};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const STOP_MESSAGE: &str =
    "Stopping due to failure. Use -k/--keep-going to continue with remaining architectures.";

const RULE_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    StopOnFirstFailure,
    KeepGoing,
}

impl FailurePolicy {
    pub fn from_keep_going(keep_going: bool) -> Self {
        if keep_going {
            FailurePolicy::KeepGoing
        } else {
            FailurePolicy::StopOnFirstFailure
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Success,
    Failed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Success => f.write_str("SUCCESS"),
            BatchStatus::Failed => f.write_str("FAILED"),
        }
    }
}

/// The pipeline operation applied to every architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Init { clean: bool },
    Build { jobs: usize, clean: bool },
}

/// Per-architecture outcomes in the order they were attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    entries: Vec<(String, BatchStatus)>,
}

impl BatchResult {
    pub fn record(&mut self, arch: &str, status: BatchStatus) {
        match self.entries.iter_mut().find(|(name, _)| name == arch) {
            Some(entry) => entry.1 = status,
            None => self.entries.push((arch.to_string(), status)),
        }
    }

    pub fn get(&self, arch: &str) -> Option<BatchStatus> {
        self.entries
            .iter()
            .find(|(name, _)| name == arch)
            .map(|(_, status)| *status)
    }

    pub fn entries(&self) -> &[(String, BatchStatus)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, status)| *status == BatchStatus::Success)
    }

    /// `<arch>: <STATUS>` lines, one per attempted architecture.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(arch, status)| format!("{}: {}\n", arch, status))
            .collect()
    }

    pub fn write_status_file(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render())
    }
}

/// Drives a [`Pipeline`] across a list of architectures, one at a time.
pub struct BatchScheduler {
    policy: FailurePolicy,
    sink: Arc<dyn OutputSink>,
    progress: Option<Arc<dyn BatchProgress>>,
    status_file: Option<PathBuf>,
    summary_title: String,
    footer: Option<String>,
    live_output: bool,
}

impl BatchScheduler {
    pub fn new(policy: FailurePolicy, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            policy,
            sink,
            progress: None,
            status_file: None,
            summary_title: "Summary".to_string(),
            footer: None,
            live_output: false,
        }
    }

    /// Report progress; only used when the batch has more than one item.
    pub fn with_progress(mut self, progress: Arc<dyn BatchProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Persist the result map to `path` at the end of the batch.
    pub fn with_status_file(mut self, path: PathBuf) -> Self {
        self.status_file = Some(path);
        self
    }

    pub fn with_summary_title(mut self, title: impl Into<String>) -> Self {
        self.summary_title = title.into();
        self
    }

    /// A line printed after the summary, e.g. where the outputs live.
    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    /// Output was shown live, so failures need not point at a log file.
    pub fn with_live_output(mut self, live: bool) -> Self {
        self.live_output = live;
        self
    }

    fn banner(&self, title: &str) {
        let rule = "=".repeat(RULE_WIDTH);
        self.sink.message(&rule);
        self.sink.message(title);
        self.sink.message(&rule);
    }

    fn item_title(pipeline: &dyn Pipeline, op: Operation, arch: &str) -> String {
        match op {
            Operation::Init { .. } => format!("Initializing {} for: {}", pipeline.kind(), arch),
            Operation::Build { .. } => format!("Building {} for: {}", pipeline.kind(), arch),
        }
    }

    fn report_failure(&self, err: &BuildError) {
        self.sink.error(&err.to_string());
        if !self.live_output
            && let Some(log) = err.log_file()
        {
            self.sink.message(&format!("Check log: {}", log.display()));
        }
    }

    /// Run `op` for every architecture in `archs`.
    ///
    /// Returns the result map; a fatal error aborts immediately.
    pub async fn run(
        &self,
        pipeline: &dyn Pipeline,
        archs: &[Architecture],
        op: Operation,
    ) -> Result<BatchResult, BuildError> {
        let total = archs.len();
        let progress = self.progress.as_ref().filter(|_| total > 1);
        let mut results = BatchResult::default();

        for (idx, arch) in archs.iter().enumerate() {
            if let Some(progress) = progress {
                progress.start_item(idx + 1, total, &arch.name);
            }
            self.banner(&Self::item_title(pipeline, op, &arch.name));

            let outcome = match op {
                Operation::Init { clean } => pipeline.init(arch, clean).await,
                Operation::Build { jobs, clean } => pipeline.build(arch, jobs, clean).await,
            };

            let status = match outcome {
                Ok(state) => {
                    tracing::info!(arch = %arch.name, %state, "architecture finished");
                    BatchStatus::Success
                }
                Err(err) if err.is_fatal() => {
                    if let Some(progress) = progress {
                        progress.finish();
                    }
                    return Err(err);
                }
                Err(err) => {
                    let state = PipelineState::Failed(err.stage().unwrap_or(Stage::Build));
                    tracing::warn!(arch = %arch.name, %state, error = %err, "architecture failed");
                    self.report_failure(&err);
                    BatchStatus::Failed
                }
            };
            results.record(&arch.name, status);
            if let Some(progress) = progress {
                progress.finish_item(&arch.name, status);
            }
            self.sink.message("");

            if status == BatchStatus::Failed && self.policy == FailurePolicy::StopOnFirstFailure {
                self.sink.message(STOP_MESSAGE);
                break;
            }
        }

        if let Some(progress) = progress {
            progress.finish();
        }

        if let Some(path) = &self.status_file {
            results
                .write_status_file(path)
                .map_err(|source| BuildError::Report {
                    path: path.clone(),
                    source,
                })?;
        }

        self.print_summary(&results);
        Ok(results)
    }

    fn print_summary(&self, results: &BatchResult) {
        self.banner(&self.summary_title);
        for (arch, status) in results.entries() {
            self.sink.message(&format!("{}: {}", arch, status));
        }
        self.sink.message("");
        if let Some(footer) = &self.footer {
            self.sink.message(footer);
        }
    }
}
