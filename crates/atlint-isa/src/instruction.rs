//! The parsed instruction record and its analysis slots.

use std::fmt;

use crate::{Branch, CondCodes, InstFlags, OpKind, OpSpec, Operand, Shape};

/// Index of an instruction in its program's instruction arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub usize);

/// Index of a basic block in its program's block arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

/// One parsed statement.
///
/// Parse-time fields are filled by [`crate::parse_line`]. Address and
/// link fields are assigned when the statement joins a program; the
/// `next`/`jump_target`/`block`/`subroutine`/`overlap` slots are rebuilt
/// on every analysis round.
#[derive(Clone, Debug)]
pub struct Instruction {
    /// Zero-based source line.
    pub line: u32,
    /// Source text after comment removal.
    pub text: String,
    /// Lowercased mnemonic or directive name.
    pub mnemonic: String,
    pub kind: OpKind,
    pub spec: Option<OpSpec>,
    pub operands: Vec<Operand>,
    /// Raw string literals of a string directive, quotes included.
    pub strings: Vec<String>,
    pub flags: InstFlags,

    pub address: u32,
    /// Address units occupied; instructions occupy one.
    pub size: u32,
    /// Alignment requested by `.align`.
    pub align: Option<u32>,
    /// Absolute target of a numeric PC-relative branch operand.
    pub dest_addr: Option<u32>,

    pub next: Option<InstrId>,
    pub jump_target: Option<InstrId>,
    pub block: Option<BlockId>,
    pub subroutine: Option<u32>,
    pub overlap: Option<u32>,
    /// Tested codes that earlier flow had already decided.
    pub redundant_cc: CondCodes,
}

impl Instruction {
    pub(crate) fn new(line: u32, text: &str, mnemonic: String) -> Self {
        Self {
            line,
            text: text.to_string(),
            mnemonic,
            kind: OpKind::Unknown,
            spec: None,
            operands: Vec::new(),
            strings: Vec::new(),
            flags: InstFlags::NONE,
            address: 0,
            size: 0,
            align: None,
            dest_addr: None,
            next: None,
            jump_target: None,
            block: None,
            subroutine: None,
            overlap: None,
            redundant_cc: CondCodes::NONE,
        }
    }

    // ============= Classification =============

    #[must_use]
    pub const fn is_code(&self) -> bool {
        self.kind.is_code()
    }

    #[must_use]
    pub const fn is_data(&self) -> bool {
        self.kind.is_data()
    }

    #[must_use]
    pub fn branch(&self) -> Option<Branch> {
        self.spec.and_then(|s| s.branch)
    }

    #[must_use]
    pub fn is_control(&self) -> bool {
        self.kind == OpKind::Control
    }

    #[must_use]
    pub fn is_call(&self) -> bool {
        self.branch() == Some(Branch::Call)
    }

    /// Condition codes this instruction overwrites.
    #[must_use]
    pub fn sets_cc(&self) -> bool {
        self.spec.is_some_and(|s| s.sets_cc) && !self.flags.contains(InstFlags::BAD_ARG_COUNT)
    }

    /// Condition codes this instruction writes or tests.
    #[must_use]
    pub fn cc_effect(&self) -> CondCodes {
        match self.branch() {
            Some(Branch::Conditional(mask)) => mask,
            Some(Branch::Jump) => CondCodes::NZP,
            _ if self.sets_cc() => CondCodes::NZP,
            _ => CondCodes::NONE,
        }
    }

    /// `ret`, `iret`, `hlt` and unconditional jumps.
    #[must_use]
    pub fn terminates(&self) -> bool {
        self.spec.is_some_and(|s| s.terminates)
    }

    /// Whether control may continue to the following statement.
    #[must_use]
    pub fn has_fallthrough(&self) -> bool {
        self.is_code() && !self.terminates() && !self.flags.contains(InstFlags::ALWAYS_BR)
    }

    /// Returns from the current routine.
    #[must_use]
    pub fn is_return(&self) -> bool {
        matches!(self.mnemonic.as_str(), "ret" | "iret")
    }

    // ============= Operands =============

    /// Source operand of a two-operand instruction.
    #[must_use]
    pub fn source(&self) -> Option<&Operand> {
        match self.operands.as_slice() {
            [src, _] => Some(src),
            _ => None,
        }
    }

    /// Destination operand: the last operand in AT&T order.
    #[must_use]
    pub fn destination(&self) -> Option<&Operand> {
        match self.spec.map(|s| s.shape) {
            Some(Shape::Unary | Shape::Binary | Shape::UnaryOrBinary) => self.operands.last(),
            _ => None,
        }
    }

    /// Label named by a direct jump or call.
    #[must_use]
    pub fn target_symbol(&self) -> Option<&str> {
        if !self.is_control() {
            return None;
        }
        let mem = self.operands.first()?.memory()?;
        if mem.indirect || !mem.registers.is_empty() {
            return None;
        }
        mem.symbol.as_deref()
    }

    /// Numeric PC-relative offset of a branch such as `jmp 5`.
    #[must_use]
    pub fn target_offset(&self) -> Option<i64> {
        if !self.is_control() {
            return None;
        }
        let mem = self.operands.first()?.memory()?;
        if mem.indirect { None } else { mem.bare_number() }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic)?;
        let mut sep = " ";
        if self.strings.is_empty() {
            for op in &self.operands {
                write!(f, "{sep}{op}")?;
                sep = ", ";
            }
        } else {
            for s in &self.strings {
                write!(f, "{sep}{s}")?;
                sep = ", ";
            }
        }
        Ok(())
    }
}
