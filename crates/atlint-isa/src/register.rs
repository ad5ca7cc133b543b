//! Register names and the tracked 32-bit register file.

use std::fmt;

/// Operand or suffix width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Width {
    Byte,
    Word,
    Long,
    Quad,
}

impl Width {
    /// Width in bytes.
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::Long => 4,
            Self::Quad => 8,
        }
    }

    /// Width named by a mnemonic suffix letter.
    #[must_use]
    pub const fn from_suffix(suffix: char) -> Option<Self> {
        match suffix {
            'b' => Some(Self::Byte),
            'w' => Some(Self::Word),
            'l' => Some(Self::Long),
            'q' => Some(Self::Quad),
            _ => None,
        }
    }

    /// Inclusive range of integers an immediate of this width may hold,
    /// accepting both signed and unsigned spellings.
    #[must_use]
    pub const fn immediate_range(self) -> (i64, i64) {
        match self {
            Self::Byte => (-0x80, 0xff),
            Self::Word => (-0x8000, 0xffff),
            Self::Long => (-0x8000_0000, 0xffff_ffff),
            Self::Quad => (i64::MIN, i64::MAX),
        }
    }
}

/// One of the nine tracked 32-bit register slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg {
    Eax,
    Ebx,
    Ecx,
    Edx,
    Esi,
    Edi,
    Ebp,
    Esp,
    Eip,
}

impl Reg {
    pub const COUNT: usize = 9;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Eax,
        Self::Ebx,
        Self::Ecx,
        Self::Edx,
        Self::Esi,
        Self::Edi,
        Self::Ebp,
        Self::Esp,
        Self::Eip,
    ];

    /// Caller-saved registers a call may overwrite.
    pub const CLOBBERED_BY_CALL: [Self; 3] = [Self::Eax, Self::Ecx, Self::Edx];
    /// Registers a subroutine must hand back unchanged.
    pub const CALLEE_SAVED: [Self; 3] = [Self::Ebx, Self::Esi, Self::Edi];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Eax => "eax",
            Self::Ebx => "ebx",
            Self::Ecx => "ecx",
            Self::Edx => "edx",
            Self::Esi => "esi",
            Self::Edi => "edi",
            Self::Ebp => "ebp",
            Self::Esp => "esp",
            Self::Eip => "eip",
        }
    }

    /// Registers that always hold a defined value on entry.
    #[must_use]
    pub const fn is_machine_managed(self) -> bool {
        matches!(self, Self::Esp | Self::Eip)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Small set of tracked registers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RegSet(u16);

impl RegSet {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self((1 << Reg::COUNT) - 1);

    #[must_use]
    pub const fn of(reg: Reg) -> Self {
        Self(1 << reg.index())
    }

    #[must_use]
    pub const fn contains(self, reg: Reg) -> bool {
        self.0 & (1 << reg.index()) != 0
    }

    pub const fn insert(&mut self, reg: Reg) {
        self.0 |= 1 << reg.index();
    }

    pub const fn remove(&mut self, reg: Reg) {
        self.0 &= !(1 << reg.index());
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = Reg> {
        Reg::ALL.into_iter().filter(move |r| self.contains(*r))
    }
}

impl FromIterator<Reg> for RegSet {
    fn from_iter<I: IntoIterator<Item = Reg>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for reg in iter {
            set.insert(reg);
        }
        set
    }
}

/// A register as written in source, e.g. `%al`, `%ax` or `%eax`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Register {
    pub reg: Reg,
    pub width: Width,
    name: &'static str,
}

const REGISTERS: [(&str, Reg, Width); 25] = [
    ("eax", Reg::Eax, Width::Long),
    ("ax", Reg::Eax, Width::Word),
    ("al", Reg::Eax, Width::Byte),
    ("ah", Reg::Eax, Width::Byte),
    ("ebx", Reg::Ebx, Width::Long),
    ("bx", Reg::Ebx, Width::Word),
    ("bl", Reg::Ebx, Width::Byte),
    ("bh", Reg::Ebx, Width::Byte),
    ("ecx", Reg::Ecx, Width::Long),
    ("cx", Reg::Ecx, Width::Word),
    ("cl", Reg::Ecx, Width::Byte),
    ("ch", Reg::Ecx, Width::Byte),
    ("edx", Reg::Edx, Width::Long),
    ("dx", Reg::Edx, Width::Word),
    ("dl", Reg::Edx, Width::Byte),
    ("dh", Reg::Edx, Width::Byte),
    ("esi", Reg::Esi, Width::Long),
    ("si", Reg::Esi, Width::Word),
    ("edi", Reg::Edi, Width::Long),
    ("di", Reg::Edi, Width::Word),
    ("ebp", Reg::Ebp, Width::Long),
    ("bp", Reg::Ebp, Width::Word),
    ("esp", Reg::Esp, Width::Long),
    ("sp", Reg::Esp, Width::Word),
    ("eip", Reg::Eip, Width::Long),
];

impl Register {
    /// Look up a register by name, without the `%` prefix.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        REGISTERS
            .iter()
            .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
            .map(|&(name, reg, width)| Self { reg, width, name })
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// True when the register names the whole 32-bit slot.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.width == Width::Long
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.name)
    }
}
