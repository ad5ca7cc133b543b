//! atlint - static checker for an AT&T-style teaching assembly dialect
//!
//! Parses a document into addressed statements, builds its control flow
//! graph, and reports dead stores, unreachable code, impossible or
//! redundant branch tests, overlapping subroutines and register misuse.
//!
//! # Example
//!
//! ```
//! use atlint::{FindingKind, findings};
//!
//! let code = atlint::analyze("movl $1, %eax\nmovl $2, %eax\nret\n");
//! let found = findings(&code);
//! assert_eq!(found[0].kind, FindingKind::DeadStore);
//! ```

// Re-export from sub-crates
pub use atlint_cfg::{
    Access, AnalysisConfig, BasicBlock, BlockFlags, Code, ConfigError, Label, RegisterStatus,
    SaveFlags, Section, SectionMark, Subroutine, DEFAULT_MAX_ROUNDS, DEFAULT_SUBROUTINE_MARKER,
};
pub use atlint_isa::{
    BlockId, Branch, CondCodes, InstFlags, InstrId, Instruction, OpKind, Operand, Reg, Register,
    Width,
};

mod check;
mod documents;
mod error;
mod findings;

pub use check::*;
pub use documents::*;
pub use error::*;
pub use findings::*;

/// Analyse `source` with the default configuration.
#[must_use]
pub fn analyze(source: &str) -> Code {
    Code::parse(source)
}

/// Analyse `source` with `config`.
///
/// # Errors
///
/// Returns [`Error::Config`] if `config` does not validate.
pub fn analyze_with(source: &str, config: &AnalysisConfig) -> Result<Code> {
    Ok(Code::with_config(source, config)?)
}
