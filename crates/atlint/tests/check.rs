//! File-level checks over temporary source trees.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use atlint::{AnalysisConfig, Error, FindingKind, Severity, check_file, check_files};

const CLEAN: &str = "\
# Sum 1..10 into %eax
.data
limit:  .long 10
.text
main:
    movl limit, %ecx
    xorl %eax, %eax
loop:
    addl %ecx, %eax
    decl %ecx
    jne loop
    ret
.end
";

const BROKEN: &str = "\
.text
main:
    movl $1, %eax
    movl $2, %eax
    addl %ebx
    ret
    nop
";

fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).expect("write source");
    path
}

#[test]
fn test_clean_program_has_no_warnings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write(&dir, "sum.s", CLEAN);
    let report = check_file(&path, &AnalysisConfig::default()).expect("check");
    let loud: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.severity() != Severity::Info)
        .collect();
    assert!(loud.is_empty(), "{loud:?}");
    assert!(!report.has_errors());
}

#[test]
fn test_broken_program_findings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write(&dir, "broken.s", BROKEN);
    let report = check_file(&path, &AnalysisConfig::default()).expect("check");
    let kinds: Vec<(u32, FindingKind)> = report.findings.iter().map(|f| (f.line, f.kind)).collect();
    assert!(kinds.contains(&(2, FindingKind::DeadStore)));
    assert!(kinds.contains(&(4, FindingKind::BadArgCount)));
    assert!(kinds.contains(&(6, FindingKind::Unreachable)));
    assert!(report.has_errors());
    assert_eq!(report.count(Severity::Error), 1);
}

#[test]
fn test_check_files_keeps_order_and_isolates_failures() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = vec![
        write(&dir, "a.s", CLEAN),
        dir.path().join("missing.s"),
        write(&dir, "b.s", BROKEN),
    ];
    let done = AtomicUsize::new(0);
    let reports = check_files(&paths, &AnalysisConfig::default(), 2, |_| {
        done.fetch_add(1, Ordering::Relaxed);
    })
    .expect("pool");
    assert_eq!(done.load(Ordering::Relaxed), 3);
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].as_ref().expect("a.s").path, paths[0]);
    assert!(matches!(reports[1], Err(Error::Read { .. })));
    assert!(reports[2].as_ref().expect("b.s").has_errors());
}

#[test]
fn test_config_flows_through() {
    let dir = tempfile::tempdir().expect("tempdir");
    let src = "call f\nhlt\n; ENTRY\nf: movl $1, %esi\nret\n";
    let path = write(&dir, "sub.s", src);

    let config = AnalysisConfig::default().with_subroutine_marker("ENTRY");
    let report = check_file(&path, &config).expect("check");
    assert_eq!(report.code.subroutines().len(), 2);
    assert!(
        report
            .findings
            .iter()
            .any(|f| matches!(f.kind, FindingKind::UnsavedRegister { .. }))
    );

    let report = check_file(&path, &AnalysisConfig::default()).expect("check");
    assert_eq!(report.code.subroutines().len(), 1);
}
