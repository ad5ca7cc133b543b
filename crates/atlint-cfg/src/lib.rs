//! Program model and analysis for the atlint assembly checker.
//!
//! [`Code::parse`] assembles a document into addressed statements and labels,
//! then iterates the analysis rounds:
//!
//! 1. link fallthrough and branch edges between statements
//! 2. mark annotated subroutine entries
//! 3. trace reachability from the program entry and each subroutine
//! 4. partition reachable code into basic blocks
//! 5. run the backward register pass and the forward condition-code pass
//!
//! Rounds repeat until the per-instruction flags stop changing or the
//! configured ceiling is reached. Nothing here fails on malformed source;
//! problems surface as [`InstFlags`] on the affected statements.

mod block;
mod code;
mod config;
mod dataflow;
mod graph;
mod reachability;
mod subroutine;

pub use block::{Access, BasicBlock, BlockFlags, RegisterStatus, SaveFlags};
pub use code::{Code, Label, Section, SectionMark};
pub use config::*;
pub use subroutine::Subroutine;

pub use atlint_isa::{BlockId, CondCodes, InstFlags, InstrId, Instruction, Reg};
