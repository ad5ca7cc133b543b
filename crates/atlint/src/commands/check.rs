//! Check command.

use std::path::PathBuf;

use tracing::error;

use atlint::{AnalysisConfig, Severity};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal::{self, Progress};

/// Handle the `check` command.
///
/// Fails when a file cannot be read or any file has error findings.
pub fn cmd_check(
    files: &[PathBuf],
    jobs: usize,
    all: bool,
    config: &AnalysisConfig,
    silent: bool,
) -> i32 {
    let progress = Progress::new(files.len(), "checking", silent || files.len() < 2);
    let reports = match atlint::check_files(files, config, jobs, |_| progress.inc()) {
        Ok(reports) => reports,
        Err(e) => {
            error!(error = %e, "check failed");
            return EXIT_FAILURE;
        }
    };
    progress.finish();

    let (mut errors, mut warnings, mut unreadable) = (0usize, 0usize, 0usize);
    for report in &reports {
        let report = match report {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "skipping file");
                unreadable += 1;
                continue;
            }
        };
        let name = report.path.display().to_string();
        for finding in &report.findings {
            if finding.severity() == Severity::Info && !all {
                continue;
            }
            println!("{}", terminal::finding_line(&name, finding));
        }
        errors += report.count(Severity::Error);
        warnings += report.count(Severity::Warning);
    }

    if !silent {
        let summary = format!(
            "{} file(s): {errors} error(s), {warnings} warning(s)",
            reports.len()
        );
        if errors > 0 {
            terminal::error(&summary);
        } else if warnings > 0 {
            terminal::warning(&summary);
        } else {
            terminal::success(&summary);
        }
    }

    if errors > 0 || unreadable > 0 {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    }
}
