//! Styled terminal output for CLI commands.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use atlint::{Finding, Severity};

/// Progress bar over the files being checked.
pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    /// Visible bar, or a hidden one when `hidden` is set.
    pub fn new(total: usize, message: &str, hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        if let Ok(template) = ProgressStyle::default_bar().template("{msg} [{bar:30.cyan/dim}] {pos}/{len}") {
            bar.set_style(template.progress_chars("━╸━"));
        }
        bar.set_message(message.to_string());
        Self { bar }
    }

    pub fn inc(&self) {
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

// ============================================================================
// Styled output helpers
// ============================================================================

/// Print a success message to stderr.
pub fn success(message: &str) {
    eprintln!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message to stderr.
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message to stderr.
pub fn warning(message: &str) {
    eprintln!("{} {}", style("!").yellow().bold(), message);
}

/// Format one finding as `file:line: severity: kind`, line one-based.
pub fn finding_line(file: &str, finding: &Finding) -> String {
    let severity = match finding.severity() {
        Severity::Error => style(finding.severity().to_string()).red().bold(),
        Severity::Warning => style(finding.severity().to_string()).yellow().bold(),
        Severity::Info => style(finding.severity().to_string()).cyan(),
    };
    format!(
        "{}:{}: {}: {}",
        style(file).bold(),
        finding.line + 1,
        severity,
        finding.kind
    )
}
