//! Parser for a 32-bit AT&T-syntax teaching assembly dialect.
//!
//! Turns source lines into [`Instruction`] records: operand classes,
//! mnemonic effects, addresses-to-be and the malformation flags the
//! linter reports. Parsing never fails; problems are recorded on the
//! instruction.

mod effects;
mod flags;
mod instruction;
pub mod lexer;
mod mnemonic;
mod operand;
mod parser;
mod register;

pub use effects::*;
pub use flags::*;
pub use instruction::*;
pub use lexer::LogicalLine;
pub use mnemonic::*;
pub use operand::*;
pub use parser::*;
pub use register::*;
