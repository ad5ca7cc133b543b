//! Bit sets for condition codes and per-instruction status flags.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Subset of the sign-based condition codes {negative, zero, positive}.
///
/// Used both for "which outcomes are possible here" during forward flow
/// and for "which outcomes make this branch taken" on conditional jumps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CondCodes(u8);

impl CondCodes {
    pub const NONE: Self = Self(0);
    pub const P: Self = Self(0b001);
    pub const Z: Self = Self(0b010);
    pub const N: Self = Self(0b100);
    pub const ZP: Self = Self(0b011);
    pub const NP: Self = Self(0b101);
    pub const NZ: Self = Self(0b110);
    pub const NZP: Self = Self(0b111);

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Codes outside `self`, within {N, Z, P}.
    #[must_use]
    pub const fn complement(self) -> Self {
        Self(!self.0 & Self::NZP.0)
    }
}

impl BitOr for CondCodes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for CondCodes {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl BitAnd for CondCodes {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl Not for CondCodes {
    type Output = Self;

    fn not(self) -> Self {
        self.complement()
    }
}

impl fmt::Display for CondCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        for (code, letter) in [(Self::N, 'n'), (Self::Z, 'z'), (Self::P, 'p')] {
            if self.contains(code) {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

/// Status flags attached to a parsed instruction.
///
/// Parse-time flags describe malformed input; analysis flags
/// (`FOUND`, `DEAD`, the branch outcome flags) are written by the
/// control-flow and dataflow passes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct InstFlags(u32);

impl InstFlags {
    pub const NONE: Self = Self(0);
    pub const INCOMPLETE: Self = Self(1 << 0);
    pub const SUBROUTINE_START: Self = Self(1 << 1);
    pub const FOUND: Self = Self(1 << 2);
    pub const DEAD: Self = Self(1 << 3);
    pub const ALWAYS_BR: Self = Self(1 << 4);
    pub const NEVER_BR: Self = Self(1 << 5);
    pub const REDUNDANT_CC: Self = Self(1 << 6);
    pub const MEMORY_TWICE: Self = Self(1 << 7);
    pub const IMMEDIATE_TWICE: Self = Self(1 << 8);
    pub const NONEXISTENT: Self = Self(1 << 9);
    pub const BAD_ARG_COUNT: Self = Self(1 << 10);
    pub const MISSING_IMM_PREFIX: Self = Self(1 << 11);
    pub const MISSING_REG_PREFIX: Self = Self(1 << 12);
    pub const SHARES_LINE_WITH_LABEL: Self = Self(1 << 13);
    pub const IMMEDIATE_OUT_OF_RANGE: Self = Self(1 << 14);
    pub const SIZE_MISMATCH: Self = Self(1 << 15);
    pub const UNSUPPORTED_WIDTH: Self = Self(1 << 16);
    pub const UNKNOWN_REGISTER: Self = Self(1 << 17);

    /// Flags recomputed from scratch at the start of every analysis round.
    pub const ROUND_LOCAL: Self = Self(Self::FOUND.0 | Self::DEAD.0 | Self::SUBROUTINE_START.0);

    /// Flags that describe a malformed source line.
    pub const MALFORMED: Self = Self(
        Self::INCOMPLETE.0
            | Self::MEMORY_TWICE.0
            | Self::IMMEDIATE_TWICE.0
            | Self::NONEXISTENT.0
            | Self::BAD_ARG_COUNT.0
            | Self::MISSING_IMM_PREFIX.0
            | Self::MISSING_REG_PREFIX.0
            | Self::IMMEDIATE_OUT_OF_RANGE.0
            | Self::SIZE_MISMATCH.0
            | Self::UNSUPPORTED_WIDTH.0
            | Self::UNKNOWN_REGISTER.0,
    );

    const NAMES: [(Self, &'static str); 18] = [
        (Self::INCOMPLETE, "incomplete"),
        (Self::SUBROUTINE_START, "subroutine-start"),
        (Self::FOUND, "found"),
        (Self::DEAD, "dead"),
        (Self::ALWAYS_BR, "always-br"),
        (Self::NEVER_BR, "never-br"),
        (Self::REDUNDANT_CC, "redundant-cc"),
        (Self::MEMORY_TWICE, "memory-twice"),
        (Self::IMMEDIATE_TWICE, "immediate-twice"),
        (Self::NONEXISTENT, "nonexistent"),
        (Self::BAD_ARG_COUNT, "bad-arg-count"),
        (Self::MISSING_IMM_PREFIX, "missing-imm-prefix"),
        (Self::MISSING_REG_PREFIX, "missing-reg-prefix"),
        (Self::SHARES_LINE_WITH_LABEL, "shares-line"),
        (Self::IMMEDIATE_OUT_OF_RANGE, "imm-range"),
        (Self::SIZE_MISMATCH, "size-mismatch"),
        (Self::UNSUPPORTED_WIDTH, "unsupported-width"),
        (Self::UNKNOWN_REGISTER, "unknown-register"),
    ];

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub const fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub const fn set(&mut self, other: Self, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }

    /// Names of the set flags, in declaration order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }
}

impl BitOr for InstFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for InstFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for InstFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for InstFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for name in self.names() {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}
