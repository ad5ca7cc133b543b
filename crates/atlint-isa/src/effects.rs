//! Register reads and writes implied by an instruction.

use crate::{Branch, Effect, Instruction, Operand, Reg, RegSet, Register};

/// Registers an instruction reads and writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Effects {
    pub reads: RegSet,
    pub writes: RegSet,
    /// Reads that consume the value: excludes the blanket reads of calls
    /// and returns and the merge read of a sub-register write.
    pub uses: RegSet,
    /// Register written through an explicit destination operand.
    pub dest: Option<Reg>,
}

impl Effects {
    fn read(&mut self, reg: &Register) {
        self.reads.insert(reg.reg);
        self.uses.insert(reg.reg);
    }

    fn read_op(&mut self, op: &Operand) {
        if let Some(reg) = op.register() {
            self.read(reg);
        }
    }

    /// Sub-register writes merge into the parent and so also read it.
    fn write_op(&mut self, op: &Operand) {
        if let Some(reg) = op.register() {
            self.writes.insert(reg.reg);
            if !reg.is_full() {
                self.reads.insert(reg.reg);
            }
            self.dest = Some(reg.reg);
        }
    }

    fn implicit(&mut self, reads: &[Reg], writes: &[Reg]) {
        for r in reads {
            self.reads.insert(*r);
            self.uses.insert(*r);
        }
        for r in writes {
            self.writes.insert(*r);
        }
    }
}

/// A register being spilled to or reloaded from a save location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveRestore {
    Save { reg: Reg, location: String },
    Restore { reg: Reg, location: String },
}

/// Stack location name used for push/pop pairs.
pub const STACK_SLOT: &str = "stack";

impl Instruction {
    /// Register effects of this instruction.
    #[must_use]
    pub fn effects(&self) -> Effects {
        let mut fx = Effects::default();
        for op in &self.operands {
            if let Some(mem) = op.memory() {
                for reg in &mem.registers {
                    fx.read(reg);
                }
            }
        }
        let Some(spec) = self.spec else {
            return fx;
        };
        let ops = self.operands.as_slice();

        match spec.effect {
            Effect::Update => match ops {
                [_, dst] if self.is_self_clear() => {
                    fx.write_op(dst);
                }
                [src, dst] => {
                    fx.read_op(src);
                    fx.read_op(dst);
                    fx.write_op(dst);
                }
                [dst] => {
                    fx.read_op(dst);
                    fx.write_op(dst);
                }
                _ => {}
            },
            Effect::Compare => {
                for op in ops {
                    fx.read_op(op);
                }
            }
            Effect::Assign => {
                if let [src, dst] = ops {
                    fx.read_op(src);
                    fx.write_op(dst);
                }
            }
            Effect::MulDiv => match ops {
                [src, dst] => {
                    fx.read_op(src);
                    fx.read_op(dst);
                    fx.write_op(dst);
                }
                [src] => {
                    fx.read_op(src);
                    if self.mnemonic.contains("div") {
                        fx.implicit(&[Reg::Eax, Reg::Edx], &[Reg::Eax, Reg::Edx]);
                    } else {
                        fx.implicit(&[Reg::Eax], &[Reg::Eax, Reg::Edx]);
                    }
                }
                _ => {}
            },
            Effect::Push => {
                if let [op] = ops {
                    fx.read_op(op);
                }
                fx.implicit(&[Reg::Esp], &[Reg::Esp]);
            }
            Effect::Pop => {
                if let [op] = ops {
                    fx.write_op(op);
                }
                fx.implicit(&[Reg::Esp], &[Reg::Esp]);
            }
            Effect::Frame => {
                fx.implicit(&[Reg::Ebp, Reg::Esp], &[Reg::Ebp, Reg::Esp]);
            }
            Effect::Return => {
                fx.reads = RegSet::ALL;
                fx.implicit(&[], &[Reg::Esp]);
            }
            Effect::None => match self.branch() {
                Some(Branch::Call) => {
                    fx.reads = RegSet::ALL;
                    fx.implicit(&[], &Reg::CLOBBERED_BY_CALL);
                    fx.implicit(&[], &[Reg::Esp]);
                }
                Some(_) => {
                    if let Some(op) = ops.first() {
                        fx.read_op(op);
                    }
                }
                None => {}
            },
        }
        fx
    }

    /// `xorl %eax, %eax` and `subl %eax, %eax` zero a register without
    /// depending on its old value.
    fn is_self_clear(&self) -> bool {
        let (Some(src), Some(dst)) = (
            self.operands.first().and_then(Operand::register),
            self.operands.get(1).and_then(Operand::register),
        ) else {
            return false;
        };
        src == dst && (self.mnemonic.starts_with("xor") || self.mnemonic.starts_with("sub"))
    }

    /// Save or restore of a full register, if this instruction is one.
    ///
    /// `push`/`pop` use the stack slot; `mov` between a register and a
    /// memory operand names the memory text as the location.
    #[must_use]
    pub fn save_restore(&self) -> Option<SaveRestore> {
        let spec = self.spec?;
        let full = |op: &Operand| op.register().filter(|r| r.is_full()).map(|r| r.reg);
        match (spec.effect, self.operands.as_slice()) {
            (Effect::Push, [op]) => Some(SaveRestore::Save {
                reg: full(op)?,
                location: STACK_SLOT.to_string(),
            }),
            (Effect::Pop, [op]) => Some(SaveRestore::Restore {
                reg: full(op)?,
                location: STACK_SLOT.to_string(),
            }),
            (Effect::Assign, [src, dst]) if self.mnemonic.starts_with("mov") => {
                match (full(src), dst.memory(), src.memory(), full(dst)) {
                    (Some(reg), Some(mem), _, _) => Some(SaveRestore::Save {
                        reg,
                        location: mem.text.clone(),
                    }),
                    (_, _, Some(mem), Some(reg)) => Some(SaveRestore::Restore {
                        reg,
                        location: mem.text.clone(),
                    }),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}
