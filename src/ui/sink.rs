//! Where user-facing output goes.
//!
//! The executor and the pipelines only know about [`OutputSink`]; the CLI
//! decides whether that is a plain console or the progress-bar UI.

use console::style;

/// Receiver for live command output and status messages.
pub trait OutputSink: Send + Sync {
    /// A line the child wrote to stdout.
    fn stdout_line(&self, line: &str);
    /// A line the child wrote to stderr. Rendered highlighted.
    fn stderr_line(&self, line: &str);
    /// A plain informational message.
    fn message(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

/// Writes straight to the terminal with no progress bars.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn stdout_line(&self, line: &str) {
        println!("{}", line);
    }

    fn stderr_line(&self, line: &str) {
        eprintln!("{}", style(line).yellow());
    }

    fn message(&self, msg: &str) {
        println!("{}", msg);
    }

    fn warn(&self, msg: &str) {
        eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
    }

    fn error(&self, msg: &str) {
        eprintln!("{} {}", style("Error:").red().bold(), msg);
    }
}
