//! Backward pass: register access, save/restore state and dead stores.

use rustc_hash::FxHashSet;

use atlint_isa::{BlockId, InstFlags, Reg, RegSet, SaveRestore};

use crate::{Access, BlockFlags, Code, RegisterStatus, SaveFlags};

enum Frame {
    Enter(BlockId),
    Exit(BlockId),
}

/// Post-order walk from `root`, `next` before `branch`.
///
/// A successor still on the current path is a loop back-edge and merges
/// as read-and-written for every register.
pub(super) fn analyze(code: &mut Code, root: BlockId) {
    let mut on_path = FxHashSet::default();
    let mut stack = vec![Frame::Enter(root)];
    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(b) => {
                if on_path.contains(&b)
                    || code.blocks[b.0].flags.contains(BlockFlags::CHECKED_BACKWARD)
                {
                    continue;
                }
                on_path.insert(b);
                stack.push(Frame::Exit(b));
                let block = &code.blocks[b.0];
                for succ in [block.branch, block.next].into_iter().flatten() {
                    stack.push(Frame::Enter(succ));
                }
            }
            Frame::Exit(b) => {
                // Still on the path while scanning: a self-loop is a back edge.
                let registers = scan(code, b, &on_path);
                on_path.remove(&b);
                let block = &mut code.blocks[b.0];
                block.registers = registers;
                block.flags.insert(BlockFlags::CHECKED_BACKWARD);
                block.flags.insert(BlockFlags::CHANGED);
            }
        }
    }
}

/// Merge successor state, then walk the block's instructions in reverse.
fn scan(code: &mut Code, b: BlockId, on_path: &FxHashSet<BlockId>) -> [RegisterStatus; Reg::COUNT] {
    let mut status: [RegisterStatus; Reg::COUNT] = std::array::from_fn(|_| RegisterStatus::default());
    let mut access = [Access::NONE; Reg::COUNT];
    let mut input = RegSet::EMPTY;

    let block = &code.blocks[b.0];
    for succ in block.successors() {
        if on_path.contains(&succ) {
            access = [Access::BOTH; Reg::COUNT];
            continue;
        }
        let succ = &code.blocks[succ.0];
        for reg in Reg::ALL {
            let theirs = succ.register(reg);
            let ours = &mut status[reg.index()];
            access[reg.index()] = access[reg.index()].union(theirs.access);
            ours.save.insert(theirs.save.without_input());
            if ours.saved_to.is_none() {
                ours.saved_to.clone_from(&theirs.saved_to);
            }
            if ours.restored_from.is_none() {
                ours.restored_from.clone_from(&theirs.restored_from);
            }
            if theirs.save.contains(SaveFlags::INPUT) {
                input.insert(reg);
            }
        }
    }

    let ids = block.instructions.clone();
    for id in ids.iter().rev() {
        let instr = &mut code.instructions[id.0];
        let fx = instr.effects();
        if let Some(dest) = fx.dest {
            if !instr.sets_cc() && access[dest.index()] == Access::WRITE {
                instr.flags.insert(InstFlags::DEAD);
            }
        }

        let saved = match instr.save_restore() {
            Some(SaveRestore::Save { reg, location }) => {
                let st = &mut status[reg.index()];
                st.save.insert(SaveFlags::SAVED);
                st.saved_to = Some(location);
                Some(reg)
            }
            Some(SaveRestore::Restore { reg, location }) => {
                let st = &mut status[reg.index()];
                st.save.insert(SaveFlags::RESTORED);
                st.restored_from = Some(location);
                None
            }
            None => None,
        };

        for reg in fx.writes.iter() {
            access[reg.index()] = Access::WRITE;
            input.remove(reg);
        }
        for reg in fx.reads.iter() {
            access[reg.index()] = Access::READ;
        }
        for reg in fx.uses.iter() {
            if Some(reg) != saved && !reg.is_machine_managed() {
                input.insert(reg);
            }
        }
    }

    for reg in Reg::ALL {
        let st = &mut status[reg.index()];
        st.access = access[reg.index()];
        if input.contains(reg) {
            st.save.insert(SaveFlags::INPUT);
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use atlint_isa::{InstFlags, Reg};

    use crate::{Access, Code, SaveFlags};

    fn dead(code: &Code) -> Vec<bool> {
        code.instructions()
            .iter()
            .map(|i| i.flags.contains(InstFlags::DEAD))
            .collect()
    }

    #[test]
    fn test_overwritten_move_is_dead() {
        let code = Code::parse("movl $1, %eax\nmovl $2, %eax\nret\n");
        assert_eq!(dead(&code), vec![true, false, false]);
    }

    #[test]
    fn test_read_between_writes_keeps_store() {
        let code = Code::parse("movl $1, %eax\nmovl %eax, %ebx\nmovl $2, %eax\nret\n");
        assert_eq!(dead(&code), vec![false, false, false, false]);
    }

    #[test]
    fn test_cc_setting_write_is_never_dead() {
        let code = Code::parse("addl $1, %eax\nmovl $2, %eax\nret\n");
        assert_eq!(dead(&code), vec![false, false, false]);
    }

    #[test]
    fn test_loop_back_edge_is_conservative() {
        let src = "movl $5, %ecx\nloop:\nmovl $0, %eax\ndecl %ecx\njne loop\nmovl $1, %eax\nret\n";
        let code = Code::parse(src);
        assert!(dead(&code).iter().all(|d| !d));
    }

    #[test]
    fn test_single_block_loop_keeps_store_read_next_iteration() {
        let src = "movl $3, %ecx\ntop:\naddl %eax, %ebx\nmovl $7, %eax\ndecl %ecx\njne top\nret\n";
        let code = Code::parse(src);
        assert!(!dead(&code)[2]);
    }

    #[test]
    fn test_entry_input_and_saves() {
        let src = "\
; @SUBROUTINE
f:
    pushl %ebx
    movl %eax, %ebx
    popl %ebx
    ret
";
        let code = Code::parse(src);
        let f = code.subroutines().iter().find(|s| s.name.as_deref() == Some("f")).unwrap();
        let entry = code.block(f.block.unwrap());
        let eax = entry.register(Reg::Eax);
        assert!(eax.save.contains(SaveFlags::INPUT));
        assert_eq!(eax.access, Access::READ);
        let ebx = entry.register(Reg::Ebx);
        assert!(ebx.save.contains(SaveFlags::SAVED_AND_RESTORED));
        assert!(!ebx.save.contains(SaveFlags::INPUT));
        assert_eq!(ebx.saved_to.as_deref(), Some("stack"));
    }
}
