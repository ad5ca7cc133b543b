//! Basic blocks and their construction from the linked instruction graph.

use rustc_hash::FxHashSet;
use tracing::{trace, trace_span};

use atlint_isa::{BlockId, CondCodes, InstFlags, InstrId, Reg};

use crate::Code;

/// Bookkeeping flags for the block passes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockFlags(u8);

impl BlockFlags {
    pub const NONE: Self = Self(0);
    /// Successors have been linked.
    pub const EXPLORED: Self = Self(1 << 0);
    pub const CHECKED_BACKWARD: Self = Self(1 << 1);
    pub const CHECKED_FORWARD: Self = Self(1 << 2);
    /// Some pass updated this block during the current round.
    pub const CHANGED: Self = Self(1 << 3);
    /// Ends in a control transfer.
    pub const HAS_BR: Self = Self(1 << 4);
    /// Contains an instruction that overwrites the condition codes.
    pub const SETS_CC: Self = Self(1 << 5);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub const fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

/// How a register is first touched from a point onwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Access(u8);

impl Access {
    pub const NONE: Self = Self(0);
    pub const WRITE: Self = Self(1);
    pub const READ: Self = Self(2);
    /// Read on some paths, written first on others.
    pub const BOTH: Self = Self(3);

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn may_read(self) -> bool {
        self.0 & Self::READ.0 != 0
    }
}

/// Save/restore state of a register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SaveFlags(u8);

impl SaveFlags {
    pub const NONE: Self = Self(0);
    pub const SAVED: Self = Self(1);
    pub const RESTORED: Self = Self(2);
    pub const SAVED_AND_RESTORED: Self = Self(3);
    /// Read before any write from this block onwards.
    pub const INPUT: Self = Self(4);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[must_use]
    pub const fn without_input(self) -> Self {
        Self(self.0 & !Self::INPUT.0)
    }
}

/// Per-register state at block entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterStatus {
    pub access: Access,
    pub save: SaveFlags,
    pub saved_to: Option<String>,
    pub restored_from: Option<String>,
}

/// Straight-line run of instructions with one entry and one exit.
#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub instructions: Vec<InstrId>,
    /// Subroutine of the first instruction.
    pub subroutine: Option<u32>,
    /// Another subroutine observed entering this block.
    pub overlap: Option<u32>,
    pub next: Option<BlockId>,
    pub branch: Option<BlockId>,
    /// Return blocks, recorded on subroutine entry blocks only.
    pub exits: Vec<BlockId>,
    pub flags: BlockFlags,
    pub registers: [RegisterStatus; Reg::COUNT],
    /// Codes possible when falling out of the block.
    pub cc: CondCodes,
    /// Union of codes possible on entry.
    pub initial_cc: CondCodes,
}

impl BasicBlock {
    fn new(subroutine: Option<u32>) -> Self {
        Self {
            instructions: Vec::new(),
            subroutine,
            overlap: None,
            next: None,
            branch: None,
            exits: Vec::new(),
            flags: BlockFlags::NONE,
            registers: std::array::from_fn(|_| RegisterStatus::default()),
            cc: CondCodes::NONE,
            initial_cc: CondCodes::NONE,
        }
    }

    #[must_use]
    pub fn first(&self) -> Option<InstrId> {
        self.instructions.first().copied()
    }

    #[must_use]
    pub fn last(&self) -> Option<InstrId> {
        self.instructions.last().copied()
    }

    pub fn successors(&self) -> impl Iterator<Item = BlockId> {
        self.next.into_iter().chain(self.branch)
    }

    #[must_use]
    pub const fn register(&self, reg: Reg) -> &RegisterStatus {
        &self.registers[reg.index()]
    }
}

/// Build the blocks of every traced subroutine.
pub(crate) fn build(code: &mut Code) {
    let _span = trace_span!("blocks").entered();
    let leaders = collect_leaders(code);
    for i in 0..code.subroutines.len() {
        let (entry, id) = (code.subroutines[i].entry, code.subroutines[i].id);
        if !code.instructions[entry.0].flags.contains(InstFlags::FOUND) {
            continue;
        }
        let root = build_from(code, entry, id, &leaders);
        code.blocks[root.0].exits = collect_exits(code, root);
        code.subroutines[i].block = Some(root);
    }
    trace!(blocks = code.blocks.len(), "blocks built");
}

/// Jump targets and subroutine entries start new blocks.
fn collect_leaders(code: &Code) -> FxHashSet<InstrId> {
    let mut leaders: FxHashSet<InstrId> = code.subroutines.iter().map(|s| s.entry).collect();
    for instr in &code.instructions {
        if instr.flags.contains(InstFlags::FOUND) {
            leaders.extend(instr.jump_target);
        }
    }
    leaders
}

fn build_from(code: &mut Code, entry: InstrId, id: u32, leaders: &FxHashSet<InstrId>) -> BlockId {
    let root = open_block(code, entry, id, leaders);
    let mut pending = vec![root];
    while let Some(b) = pending.pop() {
        if code.blocks[b.0].flags.contains(BlockFlags::EXPLORED) {
            continue;
        }
        code.blocks[b.0].flags.insert(BlockFlags::EXPLORED);
        let Some(last) = code.blocks[b.0].last() else {
            continue;
        };
        let (next, target, is_call) = {
            let instr = &code.instructions[last.0];
            (instr.next, instr.jump_target, instr.is_call())
        };

        if let Some(n) = next.filter(|n| code.instructions[n.0].is_code()) {
            let nb = open_block(code, n, id, leaders);
            code.blocks[b.0].next = Some(nb);
            if !is_foreign_entry(code, n, id) {
                pending.push(nb);
            }
        }
        let target = target.filter(|t| {
            let instr = &code.instructions[t.0];
            instr.is_code() && !(is_call && instr.flags.contains(InstFlags::SUBROUTINE_START))
        });
        if let Some(t) = target {
            let tb = open_block(code, t, id, leaders);
            code.blocks[b.0].branch = Some(tb);
            if !is_foreign_entry(code, t, id) {
                pending.push(tb);
            }
        }
    }
    root
}

/// Entry of a subroutine other than `id`; explored from its own root.
fn is_foreign_entry(code: &Code, instr: InstrId, id: u32) -> bool {
    let instr = &code.instructions[instr.0];
    instr.flags.contains(InstFlags::SUBROUTINE_START) && instr.subroutine != Some(id)
}

/// Return the block starting at `start`, creating it if needed.
///
/// A block extends until a control transfer, a statement that is not
/// code, a leader, or an instruction already placed in a block.
fn open_block(code: &mut Code, start: InstrId, id: u32, leaders: &FxHashSet<InstrId>) -> BlockId {
    if let Some(existing) = code.instructions[start.0].block {
        let block = &mut code.blocks[existing.0];
        if block.subroutine != Some(id) {
            block.overlap = Some(id);
        }
        return existing;
    }

    let bid = BlockId(code.blocks.len());
    let mut block = BasicBlock::new(code.instructions[start.0].subroutine);
    if block.subroutine != Some(id) {
        block.overlap = Some(id);
    }
    let mut cur = start;
    loop {
        let instr = &mut code.instructions[cur.0];
        instr.block = Some(bid);
        block.instructions.push(cur);
        if instr.sets_cc() {
            block.flags.insert(BlockFlags::SETS_CC);
        }
        if instr.is_control() {
            block.flags.insert(BlockFlags::HAS_BR);
            break;
        }
        let Some(next) = instr.next else {
            break;
        };
        let following = &code.instructions[next.0];
        if !following.is_code() || following.block.is_some() || leaders.contains(&next) {
            break;
        }
        cur = next;
    }
    code.blocks.push(block);
    bid
}

/// Blocks reachable from `root` that end in a return.
fn collect_exits(code: &Code, root: BlockId) -> Vec<BlockId> {
    let mut seen = FxHashSet::default();
    let mut stack = vec![root];
    let mut exits = Vec::new();
    while let Some(b) = stack.pop() {
        if !seen.insert(b) {
            continue;
        }
        let block = &code.blocks[b.0];
        if block.last().is_some_and(|i| code.instructions[i.0].is_return()) {
            exits.push(b);
        }
        stack.extend(block.successors());
    }
    exits.sort_unstable();
    exits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_union() {
        assert_eq!(Access::READ.union(Access::WRITE), Access::BOTH);
        assert!(Access::BOTH.may_read());
        assert!(!Access::WRITE.may_read());
    }

    #[test]
    fn test_block_flags() {
        let mut flags = BlockFlags::NONE;
        flags.insert(BlockFlags::EXPLORED);
        flags.insert(BlockFlags::HAS_BR);
        assert!(flags.contains(BlockFlags::HAS_BR));
        flags.remove(BlockFlags::HAS_BR);
        assert!(!flags.contains(BlockFlags::HAS_BR));
        assert!(flags.contains(BlockFlags::EXPLORED));
    }

    #[test]
    fn test_blocks_split_at_branches_and_targets() {
        let code = Code::parse(
            ".text\nmain:\n  movl $3, %ecx\nloop:\n  decl %ecx\n  jne loop\n  ret\n",
        );
        let main = code.main().unwrap();
        let root = code.block(main.block.unwrap());
        assert_eq!(root.instructions.len(), 1);
        let body = code.block(root.next.unwrap());
        assert_eq!(body.instructions.len(), 2);
        assert!(body.flags.contains(BlockFlags::HAS_BR));
        assert!(body.flags.contains(BlockFlags::SETS_CC));
        assert_eq!(body.branch, root.next);
        let tail = code.block(body.next.unwrap());
        assert_eq!(root.exits, vec![body.next.unwrap()]);
        assert_eq!(tail.instructions.len(), 1);
    }
}
