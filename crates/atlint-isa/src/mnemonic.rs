//! Mnemonic table: operation kind, operand shape and effects per opcode.

use crate::{CondCodes, Width};

/// Coarse class of a parsed line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    Arithmetic,
    UnaryArithmetic,
    Move,
    Stack,
    Control,
    Alone,
    Label,
    DirectiveNumber,
    DirectiveString,
    DirectiveGlobal,
    DirectiveAlign,
    DirectiveData,
    DirectiveText,
    DirectiveEnd,
    Unknown,
}

impl OpKind {
    /// Storage directives that occupy data bytes.
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, Self::DirectiveNumber | Self::DirectiveString)
    }

    /// Anything the machine would execute.
    #[must_use]
    pub const fn is_code(self) -> bool {
        matches!(
            self,
            Self::Arithmetic
                | Self::UnaryArithmetic
                | Self::Move
                | Self::Stack
                | Self::Control
                | Self::Alone
                | Self::Unknown
        )
    }

    #[must_use]
    pub const fn is_section_marker(self) -> bool {
        matches!(self, Self::DirectiveData | Self::DirectiveText | Self::DirectiveEnd)
    }
}

/// How a control instruction leaves its block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Branch {
    /// Unconditional jump.
    Jump,
    /// Conditional jump taken when any of the given codes holds.
    Conditional(CondCodes),
    /// Conditional jump on flags the sign model does not track.
    Untracked,
    Call,
}

/// Operand layout accepted by a mnemonic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// No operands.
    Nullary,
    /// One operand.
    Unary,
    /// Source and destination.
    Binary,
    /// One operand or source and destination (`imul`, `div`).
    UnaryOrBinary,
    /// Two immediates (`enter`).
    Frame,
    /// One jump or call target.
    Target,
    /// One or more numeric values.
    Values,
    /// One alignment value.
    Alignment,
    /// One symbol name.
    Symbol,
    /// One or more string literals.
    Strings,
}

/// Register semantics of an arithmetic-style opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Reads source and destination, writes destination.
    Update,
    /// Reads both operands, writes nothing (`cmp`, `test`).
    Compare,
    /// Reads source, writes destination (`mov`, `lea`, `movz`).
    Assign,
    /// Implicit `%eax`/`%edx` multiply or divide.
    MulDiv,
    Push,
    Pop,
    /// `enter`/`leave` frame setup and teardown.
    Frame,
    /// `ret`, `iret`: reads every register.
    Return,
    None,
}

/// Static description of a mnemonic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpSpec {
    pub kind: OpKind,
    pub shape: Shape,
    pub effect: Effect,
    /// Width named by the suffix, checked against register operands.
    pub width: Option<Width>,
    pub sets_cc: bool,
    pub branch: Option<Branch>,
    /// First operand is a shift count and exempt from the width check.
    pub count_operand: bool,
    /// Execution never continues to the following line.
    pub terminates: bool,
}

impl OpSpec {
    const fn new(kind: OpKind, shape: Shape, effect: Effect) -> Self {
        Self {
            kind,
            shape,
            effect,
            width: None,
            sets_cc: false,
            branch: None,
            count_operand: false,
            terminates: false,
        }
    }

    const fn sets_cc(mut self) -> Self {
        self.sets_cc = true;
        self
    }

    const fn width(mut self, width: Option<Width>) -> Self {
        self.width = width;
        self
    }

    const fn branch(mut self, branch: Branch) -> Self {
        self.branch = Some(branch);
        self
    }

    const fn terminates(mut self) -> Self {
        self.terminates = true;
        self
    }
}

const UPDATE: [&str; 7] = ["add", "sub", "adc", "sbb", "and", "or", "xor"];
const COMPARE: [&str; 2] = ["cmp", "test"];
const SHIFT: [&str; 8] = ["sal", "shl", "sar", "shr", "rol", "ror", "rcl", "rcr"];
const MULDIV: [&str; 4] = ["mul", "imul", "div", "idiv"];
const UNARY_CC: [&str; 3] = ["inc", "dec", "neg"];
const EXTEND: [&str; 6] = ["movzbl", "movzbw", "movzwl", "movsbl", "movsbw", "movswl"];

/// Condition masks for the sign-modelled conditional jumps, by condition suffix.
const CONDITIONS: [(&str, CondCodes); 24] = [
    ("l", CondCodes::N),
    ("b", CondCodes::N),
    ("nge", CondCodes::N),
    ("nae", CondCodes::N),
    ("c", CondCodes::N),
    ("s", CondCodes::N),
    ("e", CondCodes::Z),
    ("z", CondCodes::Z),
    ("g", CondCodes::P),
    ("a", CondCodes::P),
    ("nle", CondCodes::P),
    ("nbe", CondCodes::P),
    ("le", CondCodes::NZ),
    ("be", CondCodes::NZ),
    ("ng", CondCodes::NZ),
    ("na", CondCodes::NZ),
    ("ge", CondCodes::ZP),
    ("ae", CondCodes::ZP),
    ("nl", CondCodes::ZP),
    ("nb", CondCodes::ZP),
    ("nc", CondCodes::ZP),
    ("ns", CondCodes::ZP),
    ("ne", CondCodes::NP),
    ("nz", CondCodes::NP),
];

const UNTRACKED: [&str; 8] = ["jo", "jno", "jp", "jpe", "jnp", "jpo", "jcxz", "jecxz"];

/// Look up a lowercased mnemonic.
#[must_use]
pub fn lookup(mnemonic: &str) -> Option<OpSpec> {
    use Effect as E;
    use OpKind as K;
    use Shape as S;

    let spec = match mnemonic {
        ".byte" | ".word" | ".short" | ".long" | ".int" | ".quad" => {
            OpSpec::new(K::DirectiveNumber, S::Values, E::None)
                .width(directive_width(mnemonic))
        }
        ".ascii" | ".asciz" | ".string" => OpSpec::new(K::DirectiveString, S::Strings, E::None),
        ".globl" | ".global" => OpSpec::new(K::DirectiveGlobal, S::Symbol, E::None),
        ".align" => OpSpec::new(K::DirectiveAlign, S::Alignment, E::None),
        ".data" => OpSpec::new(K::DirectiveData, S::Nullary, E::None),
        ".text" => OpSpec::new(K::DirectiveText, S::Nullary, E::None),
        ".end" => OpSpec::new(K::DirectiveEnd, S::Nullary, E::None),
        "ret" | "iret" => OpSpec::new(K::Alone, S::Nullary, E::Return).terminates(),
        "hlt" => OpSpec::new(K::Alone, S::Nullary, E::None).terminates(),
        "nop" | "cli" | "sti" | "cld" | "std" => OpSpec::new(K::Alone, S::Nullary, E::None),
        "leave" => OpSpec::new(K::Alone, S::Nullary, E::Frame),
        "enter" => OpSpec::new(K::Stack, S::Frame, E::Frame),
        "jmp" | "j" => OpSpec::new(K::Control, S::Target, E::None)
            .branch(Branch::Jump)
            .terminates(),
        "call" => OpSpec::new(K::Control, S::Target, E::None).branch(Branch::Call),
        m if EXTEND.contains(&m) => OpSpec::new(K::Move, S::Binary, E::Assign),
        m if UNTRACKED.contains(&m) => {
            OpSpec::new(K::Control, S::Target, E::None).branch(Branch::Untracked)
        }
        m => return lookup_conditional(m).or_else(|| lookup_suffixed(m)),
    };
    Some(spec)
}

fn lookup_conditional(mnemonic: &str) -> Option<OpSpec> {
    let cond = mnemonic.strip_prefix('j')?;
    let (_, mask) = CONDITIONS.iter().find(|(c, _)| *c == cond)?;
    Some(
        OpSpec::new(OpKind::Control, Shape::Target, Effect::None)
            .branch(Branch::Conditional(*mask)),
    )
}

fn lookup_suffixed(mnemonic: &str) -> Option<OpSpec> {
    if let Some(spec) = lookup_base(mnemonic, None) {
        return Some(spec);
    }
    let suffix = mnemonic.chars().last()?;
    let width = Width::from_suffix(suffix)?;
    let base = &mnemonic[..mnemonic.len() - 1];
    lookup_base(base, Some(width))
}

fn lookup_base(base: &str, width: Option<Width>) -> Option<OpSpec> {
    use Effect as E;
    use OpKind as K;
    use Shape as S;

    let spec = if UPDATE.contains(&base) {
        OpSpec::new(K::Arithmetic, S::Binary, E::Update).sets_cc()
    } else if COMPARE.contains(&base) {
        OpSpec::new(K::Arithmetic, S::Binary, E::Compare).sets_cc()
    } else if SHIFT.contains(&base) {
        let mut spec = OpSpec::new(K::Arithmetic, S::UnaryOrBinary, E::Update).sets_cc();
        spec.count_operand = true;
        spec
    } else if MULDIV.contains(&base) {
        OpSpec::new(K::Arithmetic, S::UnaryOrBinary, E::MulDiv).sets_cc()
    } else if UNARY_CC.contains(&base) {
        OpSpec::new(K::UnaryArithmetic, S::Unary, E::Update).sets_cc()
    } else {
        match base {
            "mov" | "lea" => OpSpec::new(K::Move, S::Binary, E::Assign),
            "not" => OpSpec::new(K::UnaryArithmetic, S::Unary, E::Update),
            "push" => OpSpec::new(K::Stack, S::Unary, E::Push),
            "pop" => OpSpec::new(K::Stack, S::Unary, E::Pop),
            _ => return None,
        }
    };
    Some(spec.width(width))
}

fn directive_width(directive: &str) -> Option<Width> {
    match directive {
        ".byte" => Some(Width::Byte),
        ".word" | ".short" => Some(Width::Word),
        ".long" | ".int" => Some(Width::Long),
        ".quad" => Some(Width::Quad),
        _ => None,
    }
}
