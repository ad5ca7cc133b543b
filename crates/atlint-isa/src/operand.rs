//! Operand classification: immediates, registers and memory references.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::{InstFlags, Register};

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-)?(?:0[xX](-)?([0-9a-fA-F]+)|(0[0-7]*)|([1-9][0-9]*))$")
        .expect("number pattern is valid")
});

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_.][A-Za-z0-9_.]*$").expect("identifier pattern is valid")
});

/// Spelling of an integer literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Radix {
    Decimal,
    Hex,
    Octal,
    Char,
}

/// Parse an integer literal without the `$` prefix.
///
/// Accepts decimal, `0x` hex (including the `0x-` negative form) and
/// leading-zero octal. Literals too large for `i64` saturate.
#[must_use]
pub fn parse_number(text: &str) -> Option<(i64, Radix)> {
    let caps = NUMBER.captures(text)?;
    let negative = caps.get(1).is_some() ^ caps.get(2).is_some();
    let (digits, radix, base) = if let Some(hex) = caps.get(3) {
        (hex.as_str(), Radix::Hex, 16)
    } else if let Some(oct) = caps.get(4) {
        (oct.as_str(), Radix::Octal, 8)
    } else {
        (caps.get(5)?.as_str(), Radix::Decimal, 10)
    };
    let magnitude = i128::from_str_radix(digits, base).unwrap_or(i128::MAX);
    let value = if negative { -magnitude } else { magnitude };
    let value = i64::try_from(value).unwrap_or(if negative { i64::MIN } else { i64::MAX });
    Some((value, radix))
}

/// Parse a character literal such as `'a'` or `'\n'`.
#[must_use]
pub fn parse_char(text: &str) -> Option<i64> {
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = inner.chars();
    let c = match chars.next()? {
        '\\' => match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            other => other,
        },
        c => c,
    };
    if chars.next().is_some() {
        return None;
    }
    Some(i64::from(u32::from(c)))
}

/// True for names usable as labels and symbols.
#[must_use]
pub fn is_identifier(text: &str) -> bool {
    IDENTIFIER.is_match(text)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImmValue {
    Number(i64),
    Symbol(String),
}

/// An immediate operand (`$42`, `$0x2a`, `$buffer`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Immediate {
    pub value: ImmValue,
    pub radix: Radix,
}

impl Immediate {
    #[must_use]
    pub const fn number(&self) -> Option<i64> {
        match self.value {
            ImmValue::Number(n) => Some(n),
            ImmValue::Symbol(_) => None,
        }
    }

    /// Parse literal text without the `$` prefix.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        if let Some((n, radix)) = parse_number(text) {
            return Some(Self { value: ImmValue::Number(n), radix });
        }
        if let Some(n) = parse_char(text) {
            return Some(Self { value: ImmValue::Number(n), radix: Radix::Char });
        }
        is_identifier(text).then(|| Self {
            value: ImmValue::Symbol(text.to_string()),
            radix: Radix::Decimal,
        })
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.radix) {
            (ImmValue::Symbol(s), _) => f.write_str(s),
            (ImmValue::Number(n), Radix::Hex) if *n < 0 => write!(f, "-{:#x}", n.unsigned_abs()),
            (ImmValue::Number(n), Radix::Hex) => write!(f, "{n:#x}"),
            (ImmValue::Number(n), Radix::Octal) if *n < 0 => write!(f, "-0{:o}", n.unsigned_abs()),
            (ImmValue::Number(0), Radix::Octal) => f.write_str("0"),
            (ImmValue::Number(n), Radix::Octal) => write!(f, "0{n:o}"),
            (ImmValue::Number(n), Radix::Char) => match u32::try_from(*n).ok().and_then(char::from_u32) {
                Some('\n') => f.write_str("'\\n'"),
                Some('\t') => f.write_str("'\\t'"),
                Some('\r') => f.write_str("'\\r'"),
                Some('\0') => f.write_str("'\\0'"),
                Some(c) => write!(f, "'{c}'"),
                None => write!(f, "{n}"),
            },
            (ImmValue::Number(n), Radix::Decimal) => write!(f, "{n}"),
        }
    }
}

/// A memory operand: `label`, `4(%ebp)`, `table(,%ecx,4)`, `*%eax`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryRef {
    /// Source text without a leading `*`.
    pub text: String,
    /// Symbolic displacement, if any.
    pub symbol: Option<String>,
    /// Numeric displacement, if any.
    pub displacement: Option<i64>,
    /// Registers used to form the address.
    pub registers: Vec<Register>,
    /// Written with a leading `*`.
    pub indirect: bool,
}

impl MemoryRef {
    /// A bare number with no addressing registers, e.g. the `5` in `jmp 5`.
    #[must_use]
    pub fn bare_number(&self) -> Option<i64> {
        match (&self.symbol, self.registers.is_empty()) {
            (None, true) if !self.text.contains('(') => self.displacement,
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandClass {
    Immediate,
    Register,
    Memory,
    Invalid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Immediate(Immediate),
    Register(Register),
    Memory(MemoryRef),
    Invalid(String),
}

impl Operand {
    /// Classify one operand token, returning the flags its spelling earns.
    #[must_use]
    pub fn classify(token: &str) -> (Self, InstFlags) {
        let mut flags = InstFlags::NONE;
        if let Some(rest) = token.strip_prefix('$') {
            return Immediate::parse(rest).map_or_else(
                || (Self::Invalid(token.to_string()), InstFlags::INCOMPLETE),
                |imm| (Self::Immediate(imm), flags),
            );
        }
        let indirect = token.starts_with('*');
        let body = token.strip_prefix('*').unwrap_or(token);
        if let Some(name) = body.strip_prefix('%') {
            let Some(reg) = Register::parse(name) else {
                return (Self::Invalid(token.to_string()), InstFlags::UNKNOWN_REGISTER);
            };
            if !indirect {
                return (Self::Register(reg), flags);
            }
            // `*%eax` addresses through the register.
            let mem = MemoryRef {
                text: body.to_string(),
                symbol: None,
                displacement: None,
                registers: vec![reg],
                indirect,
            };
            return (Self::Memory(mem), flags);
        }
        if body.is_empty() {
            return (Self::Invalid(token.to_string()), InstFlags::INCOMPLETE);
        }
        if Register::parse(body).is_some() {
            flags.insert(InstFlags::MISSING_REG_PREFIX);
        }

        let (disp, paren) = body
            .find('(')
            .map_or((body, None), |open| (&body[..open], Some(&body[open..])));
        let mut mem = MemoryRef {
            text: body.to_string(),
            symbol: None,
            displacement: None,
            registers: Vec::new(),
            indirect,
        };
        if !disp.is_empty() {
            if let Some((n, _)) = parse_number(disp) {
                mem.displacement = Some(n);
            } else {
                let name = disp.split(['+', '-']).next().unwrap_or(disp);
                if is_identifier(name) {
                    mem.symbol = Some(name.to_string());
                } else {
                    flags.insert(InstFlags::INCOMPLETE);
                }
            }
        }
        let Some(paren) = paren else {
            if mem.displacement.is_some() && !indirect {
                flags.insert(InstFlags::MISSING_IMM_PREFIX);
            }
            return (Self::Memory(mem), flags);
        };
        let Some(inner) = paren.strip_prefix('(').and_then(|p| p.strip_suffix(')')) else {
            flags.insert(InstFlags::INCOMPLETE);
            return (Self::Memory(mem), flags);
        };
        for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(name) = part.strip_prefix('%') {
                match Register::parse(name) {
                    Some(reg) => mem.registers.push(reg),
                    None => flags.insert(InstFlags::UNKNOWN_REGISTER),
                }
            } else if Register::parse(part).is_some() {
                flags.insert(InstFlags::MISSING_REG_PREFIX);
            } else if parse_number(part).is_none() {
                flags.insert(InstFlags::INCOMPLETE);
            }
        }
        (Self::Memory(mem), flags)
    }

    #[must_use]
    pub const fn class(&self) -> OperandClass {
        match self {
            Self::Immediate(_) => OperandClass::Immediate,
            Self::Register(_) => OperandClass::Register,
            Self::Memory(_) => OperandClass::Memory,
            Self::Invalid(_) => OperandClass::Invalid,
        }
    }

    #[must_use]
    pub const fn register(&self) -> Option<&Register> {
        match self {
            Self::Register(reg) => Some(reg),
            _ => None,
        }
    }

    #[must_use]
    pub const fn memory(&self) -> Option<&MemoryRef> {
        match self {
            Self::Memory(mem) => Some(mem),
            _ => None,
        }
    }

    #[must_use]
    pub const fn immediate(&self) -> Option<&Immediate> {
        match self {
            Self::Immediate(imm) => Some(imm),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(imm) => write!(f, "${imm}"),
            Self::Register(reg) => write!(f, "{reg}"),
            Self::Memory(mem) if mem.indirect => write!(f, "*{}", mem.text),
            Self::Memory(mem) => f.write_str(&mem.text),
            Self::Invalid(text) => f.write_str(text),
        }
    }
}
