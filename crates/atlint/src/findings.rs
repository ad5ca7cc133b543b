//! Findings derived from a finished analysis.
//!
//! A finding is a line number and a kind; rendering prose is left to the
//! caller.

use std::fmt;

use rustc_hash::FxHashSet;

use atlint_cfg::{Code, CondCodes, InstFlags, Reg, SaveFlags, Section};
use atlint_isa::{Branch, OpKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FindingKind {
    // Shape of a single statement.
    Incomplete,
    UnknownMnemonic,
    BadArgCount,
    MemoryTwice,
    ImmediateTwice,
    MissingImmediatePrefix,
    MissingRegisterPrefix,
    UnknownRegister,
    ImmediateOutOfRange,
    SizeMismatch,
    UnsupportedWidth,
    SharesLineWithLabel,

    // Placement relative to section markers.
    OutsideProgram,
    CodeInData,
    DataInText,
    AfterEnd,

    // Control and data flow.
    Unreachable,
    DeadStore,
    NeverTaken,
    AlwaysTaken,
    RedundantCondition { codes: CondCodes },
    SubroutineOverlap { other: u32 },
    UninitializedRead { reg: Reg },
    UnsavedRegister { reg: Reg },
}

impl FindingKind {
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::Incomplete
            | Self::UnknownMnemonic
            | Self::BadArgCount
            | Self::MemoryTwice
            | Self::ImmediateTwice
            | Self::MissingImmediatePrefix
            | Self::MissingRegisterPrefix
            | Self::UnknownRegister
            | Self::ImmediateOutOfRange
            | Self::SizeMismatch
            | Self::UnsupportedWidth
            | Self::OutsideProgram
            | Self::CodeInData
            | Self::DataInText
            | Self::AfterEnd => Severity::Error,
            Self::SharesLineWithLabel => Severity::Info,
            _ => Severity::Warning,
        }
    }

    /// Stable kebab-case identifier.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Incomplete => "incomplete",
            Self::UnknownMnemonic => "unknown-mnemonic",
            Self::BadArgCount => "bad-arg-count",
            Self::MemoryTwice => "memory-twice",
            Self::ImmediateTwice => "immediate-twice",
            Self::MissingImmediatePrefix => "missing-immediate-prefix",
            Self::MissingRegisterPrefix => "missing-register-prefix",
            Self::UnknownRegister => "unknown-register",
            Self::ImmediateOutOfRange => "immediate-out-of-range",
            Self::SizeMismatch => "size-mismatch",
            Self::UnsupportedWidth => "unsupported-width",
            Self::SharesLineWithLabel => "shares-line-with-label",
            Self::OutsideProgram => "outside-program",
            Self::CodeInData => "code-in-data",
            Self::DataInText => "data-in-text",
            Self::AfterEnd => "after-end",
            Self::Unreachable => "unreachable",
            Self::DeadStore => "dead-store",
            Self::NeverTaken => "never-taken",
            Self::AlwaysTaken => "always-taken",
            Self::RedundantCondition { .. } => "redundant-condition",
            Self::SubroutineOverlap { .. } => "subroutine-overlap",
            Self::UninitializedRead { .. } => "uninitialized-read",
            Self::UnsavedRegister { .. } => "unsaved-register",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())?;
        match self {
            Self::RedundantCondition { codes } => write!(f, " [{codes}]"),
            Self::SubroutineOverlap { other } => write!(f, " [{other:#x}]"),
            Self::UninitializedRead { reg } | Self::UnsavedRegister { reg } => {
                write!(f, " [%{reg}]")
            }
            _ => Ok(()),
        }
    }
}

/// One reportable condition at a source line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Finding {
    /// Zero-based source line.
    pub line: u32,
    pub kind: FindingKind,
}

impl Finding {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

const SHAPE: [(InstFlags, FindingKind); 12] = [
    (InstFlags::INCOMPLETE, FindingKind::Incomplete),
    (InstFlags::NONEXISTENT, FindingKind::UnknownMnemonic),
    (InstFlags::BAD_ARG_COUNT, FindingKind::BadArgCount),
    (InstFlags::MEMORY_TWICE, FindingKind::MemoryTwice),
    (InstFlags::IMMEDIATE_TWICE, FindingKind::ImmediateTwice),
    (InstFlags::MISSING_IMM_PREFIX, FindingKind::MissingImmediatePrefix),
    (InstFlags::MISSING_REG_PREFIX, FindingKind::MissingRegisterPrefix),
    (InstFlags::UNKNOWN_REGISTER, FindingKind::UnknownRegister),
    (InstFlags::IMMEDIATE_OUT_OF_RANGE, FindingKind::ImmediateOutOfRange),
    (InstFlags::SIZE_MISMATCH, FindingKind::SizeMismatch),
    (InstFlags::UNSUPPORTED_WIDTH, FindingKind::UnsupportedWidth),
    (InstFlags::SHARES_LINE_WITH_LABEL, FindingKind::SharesLineWithLabel),
];

/// Everything reportable about `code`, ordered by line.
#[must_use]
pub fn findings(code: &Code) -> Vec<Finding> {
    let mut out = Vec::new();
    shape(code, &mut out);
    placement(code, &mut out);
    flow(code, &mut out);
    overlaps(code, &mut out);
    registers(code, &mut out);
    out.sort_by_key(|f| (f.line, f.kind.severity()));
    out.dedup();
    out
}

fn shape(code: &Code, out: &mut Vec<Finding>) {
    for instr in code.instructions() {
        for (flag, kind) in SHAPE {
            if instr.flags.contains(flag) {
                out.push(Finding { line: instr.line, kind });
            }
        }
    }
}

fn placement(code: &Code, out: &mut Vec<Finding>) {
    let has_sections = code.data_section().is_some() || code.text_section().is_some();
    for instr in code.instructions() {
        if instr.kind.is_section_marker() || instr.kind == OpKind::DirectiveGlobal {
            continue;
        }
        let kind = match code.section_of_line(instr.line) {
            Section::AfterEnd => Some(FindingKind::AfterEnd),
            Section::BeforeData if has_sections => Some(FindingKind::OutsideProgram),
            Section::Data if instr.is_code() => Some(FindingKind::CodeInData),
            Section::Text if instr.is_data() && code.text_section().is_some() => {
                Some(FindingKind::DataInText)
            }
            _ => None,
        };
        if let Some(kind) = kind {
            out.push(Finding { line: instr.line, kind });
        }
    }
}

/// Unreachable runs are reported once, at their first statement.
fn flow(code: &Code, out: &mut Vec<Finding>) {
    let mut in_dead_run = false;
    for instr in code.instructions() {
        if !instr.is_code() {
            continue;
        }
        let line = instr.line;
        if !instr.flags.contains(InstFlags::FOUND) {
            if !in_dead_run && code.section_of_line(line) == Section::Text {
                out.push(Finding { line, kind: FindingKind::Unreachable });
            }
            in_dead_run = true;
            continue;
        }
        in_dead_run = false;

        if instr.flags.contains(InstFlags::DEAD) {
            out.push(Finding { line, kind: FindingKind::DeadStore });
        }
        if !matches!(instr.branch(), Some(Branch::Conditional(_))) {
            continue;
        }
        if instr.flags.contains(InstFlags::NEVER_BR) {
            out.push(Finding { line, kind: FindingKind::NeverTaken });
        }
        if instr.flags.contains(InstFlags::ALWAYS_BR) {
            out.push(Finding { line, kind: FindingKind::AlwaysTaken });
        }
        if !instr.redundant_cc.is_empty() {
            out.push(Finding {
                line,
                kind: FindingKind::RedundantCondition { codes: instr.redundant_cc },
            });
        }
    }
}

/// First shared statement of each overlapping pair of routines.
fn overlaps(code: &Code, out: &mut Vec<Finding>) {
    let mut seen = FxHashSet::default();
    for instr in code.instructions() {
        let (Some(owner), Some(other)) = (instr.subroutine, instr.overlap) else {
            continue;
        };
        if owner != other && seen.insert((owner, other)) {
            out.push(Finding {
                line: instr.line,
                kind: FindingKind::SubroutineOverlap { other },
            });
        }
    }
}

fn registers(code: &Code, out: &mut Vec<Finding>) {
    for sub in code.subroutines() {
        let Some(block) = sub.block else {
            continue;
        };
        let entry = code.block(block);
        let line = code.instruction(sub.entry).line;
        if sub.is_main {
            for reg in Reg::ALL {
                if entry.register(reg).save.contains(SaveFlags::INPUT) {
                    out.push(Finding { line, kind: FindingKind::UninitializedRead { reg } });
                }
            }
            continue;
        }
        for reg in Reg::CALLEE_SAVED {
            let written = code
                .instructions()
                .iter()
                .filter(|i| i.subroutine == Some(sub.id))
                .any(|i| i.effects().writes.contains(reg));
            if written && !entry.register(reg).save.contains(SaveFlags::SAVED_AND_RESTORED) {
                out.push(Finding { line, kind: FindingKind::UnsavedRegister { reg } });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(u32, FindingKind)> {
        findings(&Code::parse(src))
            .into_iter()
            .map(|f| (f.line, f.kind))
            .collect()
    }

    #[test]
    fn test_shape_findings() {
        let found = kinds("addl %eax\nmovl eax, %ebx\nfoo %eax\nret\n");
        assert!(found.contains(&(0, FindingKind::BadArgCount)));
        assert!(found.contains(&(1, FindingKind::MissingRegisterPrefix)));
        assert!(found.contains(&(2, FindingKind::UnknownMnemonic)));
    }

    #[test]
    fn test_dead_store_and_unreachable() {
        let found = kinds("movl $1, %eax\nmovl $2, %eax\nret\nnop\nnop\n");
        assert_eq!(
            found,
            vec![(0, FindingKind::DeadStore), (3, FindingKind::Unreachable)]
        );
    }

    #[test]
    fn test_branch_findings() {
        let found = kinds("cmpl $0, %eax\nje L1\nje L1\nnop\nL1: ret\n");
        assert!(found.contains(&(2, FindingKind::NeverTaken)));
        assert!(found.contains(&(2, FindingKind::RedundantCondition { codes: CondCodes::Z })));
        assert!(!found.iter().any(|(line, _)| *line == 1));
    }

    #[test]
    fn test_placement() {
        let src = "nop\n.data\nx: .long 1\n addl $1, %eax\n.text\n.byte 3\nret\n.end\nnop\n";
        let found = kinds(src);
        assert!(found.contains(&(0, FindingKind::OutsideProgram)));
        assert!(found.contains(&(3, FindingKind::CodeInData)));
        assert!(found.contains(&(5, FindingKind::DataInText)));
        assert!(found.contains(&(8, FindingKind::AfterEnd)));
    }

    #[test]
    fn test_uninitialized_read_in_main() {
        let found = kinds("addl %ebx, %eax\nret\n");
        assert!(found.contains(&(0, FindingKind::UninitializedRead { reg: Reg::Eax })));
        assert!(found.contains(&(0, FindingKind::UninitializedRead { reg: Reg::Ebx })));
    }

    #[test]
    fn test_unsaved_callee_register() {
        let src = "call f\nhlt\n; @SUBROUTINE\nf: movl $1, %esi\nret\n";
        let found = kinds(src);
        assert!(found.contains(&(3, FindingKind::UnsavedRegister { reg: Reg::Esi })));

        let src = "call f\nhlt\n; @SUBROUTINE\nf: pushl %esi\nmovl $1, %esi\npopl %esi\nret\n";
        let found = kinds(src);
        assert!(!found.iter().any(|(_, k)| matches!(k, FindingKind::UnsavedRegister { .. })));
    }

    #[test]
    fn test_overlap_reported_once() {
        let src = "\
call f
call g
hlt
; @SUBROUTINE
f: movl $1, %eax
jmp shared
; @SUBROUTINE
g: movl $2, %eax
shared: nop
ret
";
        let found = kinds(src);
        let overlaps: Vec<_> = found
            .iter()
            .filter(|(_, k)| matches!(k, FindingKind::SubroutineOverlap { .. }))
            .collect();
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].0, 8);
    }

    #[test]
    fn test_display() {
        let kind = FindingKind::UninitializedRead { reg: Reg::Ecx };
        assert_eq!(kind.to_string(), "uninitialized-read [%ecx]");
        assert_eq!(kind.severity(), Severity::Warning);
        assert_eq!(FindingKind::CodeInData.severity(), Severity::Error);
        assert_eq!(FindingKind::RedundantCondition { codes: CondCodes::NZ }.to_string(), "redundant-condition [nz]");
    }
}
