use crate::batch::BatchStatus;
use crate::ui::OutputSink;
use crate::ui::icons::{CHECK, CROSS, WARN};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress callbacks issued by the batch scheduler.
pub trait BatchProgress: Send + Sync {
    /// An architecture is about to run. `index` is 1-based.
    fn start_item(&self, index: usize, total: usize, arch: &str);
    fn finish_item(&self, arch: &str, status: BatchStatus);
    /// Tear the bars down before the summary is printed.
    fn finish(&self);
}

/// Terminal UI for a multi-architecture batch, rendered via `indicatif`.
///
/// Two bars are stacked vertically:
/// - Batch bar — `{pos}/{len}` with the architecture currently running
/// - Current bar — spinner for the running architecture
///
/// Every line of output goes through `MultiProgress::println` so the bars are
/// redrawn below it instead of being overwritten. When the draw target is
/// hidden (not a terminal) lines go straight to stdout/stderr.
pub struct BatchUI {
    multi: MultiProgress,
    batch_bar: ProgressBar,
    current_bar: ProgressBar,
    label: String,
}

impl BatchUI {
    /// `label` names the batch, e.g. `"Building toolchains"`.
    pub fn new(total: usize, label: &str) -> Self {
        let multi = MultiProgress::new();

        let batch_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let batch_bar = multi.add(ProgressBar::new(total as u64));
        batch_bar.set_style(batch_style);
        batch_bar.set_prefix(label.to_string());

        let current_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg} {elapsed:.dim}")
            .expect("progress bar template is a valid static string");

        let current_bar = multi.add(ProgressBar::new_spinner());
        current_bar.set_style(current_style);
        current_bar.set_prefix("  Current");

        Self {
            multi,
            batch_bar,
            current_bar,
            label: label.to_string(),
        }
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.is_hidden() {
            println!("{}", msg.as_ref());
        } else if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    fn print_err_line(&self, msg: impl AsRef<str>) {
        if self.multi.is_hidden() || self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }
}

impl BatchProgress for BatchUI {
    fn start_item(&self, index: usize, total: usize, arch: &str) {
        self.batch_bar.set_message(format!(
            "{} [{}/{}] ({})",
            self.label,
            index,
            total,
            style(arch).yellow()
        ));
        self.current_bar
            .set_message(format!("{} {}...", self.label, style(arch).cyan()));
        self.current_bar
            .enable_steady_tick(Duration::from_millis(100));
    }

    fn finish_item(&self, arch: &str, status: BatchStatus) {
        self.current_bar.disable_steady_tick();
        let line = match status {
            BatchStatus::Success => format!("{}{}: {}", CHECK, arch, style(status).green()),
            BatchStatus::Failed => format!("{}{}: {}", CROSS, arch, style(status).red()),
        };
        self.print_line(line);
        self.batch_bar.inc(1);
    }

    fn finish(&self) {
        self.current_bar.finish_and_clear();
        self.batch_bar.finish_and_clear();
    }
}

impl OutputSink for BatchUI {
    fn stdout_line(&self, line: &str) {
        self.print_line(line);
    }

    fn stderr_line(&self, line: &str) {
        self.print_err_line(style(line).yellow().to_string());
    }

    fn message(&self, msg: &str) {
        self.print_line(msg);
    }

    fn warn(&self, msg: &str) {
        self.print_err_line(format!("{}{}", WARN, style(msg).yellow()));
    }

    fn error(&self, msg: &str) {
        self.print_err_line(format!("{}{}", CROSS, style(msg).red()));
    }
}
