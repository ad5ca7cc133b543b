//! Checking source files on disk.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info_span};

use atlint_cfg::{AnalysisConfig, Code};

use crate::{Error, Finding, Result, Severity, findings};

/// Analysis and findings for one file.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub code: Code,
    pub findings: Vec<Finding>,
}

impl FileReport {
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity() == severity)
            .count()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }
}

/// Read and analyse one file.
///
/// # Errors
///
/// Returns [`Error::Read`] if the file cannot be read and
/// [`Error::Config`] if `config` does not validate.
pub fn check_file(path: &Path, config: &AnalysisConfig) -> Result<FileReport> {
    let _span = info_span!("check", path = %path.display()).entered();
    let source = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let code = Code::with_config(&source, config)?;
    let findings = findings(&code);
    debug!(findings = findings.len(), rounds = code.rounds(), "checked");
    Ok(FileReport {
        path: path.to_path_buf(),
        code,
        findings,
    })
}

/// Check `paths` on a pool of `jobs` threads (0 = one per CPU).
///
/// Results keep the order of `paths`; a file that cannot be read yields
/// its error without affecting the others.
///
/// # Errors
///
/// Returns [`Error::Config`] for an invalid `config` and
/// [`Error::ThreadPool`] if the pool cannot be started.
pub fn check_files(
    paths: &[PathBuf],
    config: &AnalysisConfig,
    jobs: usize,
    on_done: impl Fn(&Path) + Sync,
) -> Result<Vec<Result<FileReport>>> {
    config.validate()?;
    let threads = if jobs == 0 { num_cpus::get() } else { jobs };
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    debug!(files = paths.len(), threads, "checking");
    Ok(pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let report = check_file(path, config);
                on_done(path);
                report
            })
            .collect()
    }))
}
