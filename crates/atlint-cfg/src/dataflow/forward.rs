//! Forward pass: possible condition codes and branch outcome flags.

use atlint_isa::{BlockId, Branch, CondCodes, InstFlags, Instruction};

use crate::{BlockFlags, Code};

/// Propagate condition codes from `root`; returns blocks updated.
///
/// A block is rescanned only when the incoming codes widen its recorded
/// initial set, which bounds the walk on cyclic graphs.
pub(super) fn analyze(code: &mut Code, root: BlockId) -> usize {
    let mut updated = 0;
    let mut work = vec![(root, CondCodes::NZP)];
    while let Some((b, incoming)) = work.pop() {
        let block = &mut code.blocks[b.0];
        let initial = block.initial_cc | incoming;
        if block.flags.contains(BlockFlags::CHECKED_FORWARD) && initial == block.initial_cc {
            continue;
        }
        block.initial_cc = initial;
        block.flags.insert(BlockFlags::CHECKED_FORWARD);
        block.flags.insert(BlockFlags::CHANGED);
        updated += 1;

        let (fall, taken) = scan(code, b, initial);
        let block = &mut code.blocks[b.0];
        block.cc = fall;
        if let Some(next) = block.next {
            if !fall.is_empty() {
                work.push((next, fall));
            }
        }
        if let Some(branch) = block.branch {
            if !taken.is_empty() {
                work.push((branch, taken));
            }
        }
    }
    updated
}

/// Walk one block; returns the fallthrough and taken code sets.
fn scan(code: &mut Code, b: BlockId, initial: CondCodes) -> (CondCodes, CondCodes) {
    let mut cc = initial;
    let mut taken = CondCodes::NONE;
    for id in code.blocks[b.0].instructions.clone() {
        let instr = &mut code.instructions[id.0];
        if instr.sets_cc() {
            cc = CondCodes::NZP;
            continue;
        }
        match instr.branch() {
            Some(Branch::Conditional(test)) => {
                taken = cc & test;
                let fall = cc.difference(test);
                classify(instr, test, cc, taken, fall);
                cc = fall;
            }
            Some(Branch::Jump | Branch::Untracked) => taken = cc,
            Some(Branch::Call) => {
                taken = cc;
                cc = CondCodes::NZP;
            }
            None => {}
        }
    }
    (cc, taken)
}

/// Record never-taken, always-taken and redundant-test outcomes.
fn classify(
    instr: &mut Instruction,
    test: CondCodes,
    cc: CondCodes,
    taken: CondCodes,
    fall: CondCodes,
) {
    instr.flags.remove(InstFlags::NEVER_BR);
    instr.flags.remove(InstFlags::ALWAYS_BR);
    instr.flags.remove(InstFlags::REDUNDANT_CC);
    instr.flags.set(InstFlags::NEVER_BR, taken.is_empty());
    instr.flags.set(InstFlags::ALWAYS_BR, fall.is_empty());
    instr.redundant_cc = test.difference(cc);
    instr.flags.set(
        InstFlags::REDUNDANT_CC,
        !instr.redundant_cc.is_empty() || fall.is_empty(),
    );
}

#[cfg(test)]
mod tests {
    use atlint_isa::{CondCodes, InstFlags};

    use crate::Code;

    #[test]
    fn test_repeated_test_is_redundant_and_never_taken() {
        let code = Code::parse("cmpl $0, %eax\nje L1\nje L1\nnop\nL1: ret\n");
        let first = &code.instructions()[1];
        let second = &code.instructions()[2];
        assert!(!first.flags.contains(InstFlags::REDUNDANT_CC));
        assert!(!first.flags.contains(InstFlags::NEVER_BR));
        assert!(second.flags.contains(InstFlags::REDUNDANT_CC));
        assert!(second.flags.contains(InstFlags::NEVER_BR));
        assert_eq!(second.redundant_cc, CondCodes::Z);
        assert_eq!(second.jump_target, None);
    }

    #[test]
    fn test_complementary_branches() {
        let code = Code::parse("cmpl $0, %eax\njl neg\njge pos\nneg: nop\npos: ret\n");
        let jge = &code.instructions()[2];
        assert!(jge.flags.contains(InstFlags::ALWAYS_BR));
        assert!(jge.flags.contains(InstFlags::REDUNDANT_CC));
        assert_eq!(jge.next, None);
    }

    #[test]
    fn test_call_resets_codes() {
        let code = Code::parse("cmpl $0, %eax\nje L1\ncall f\nje L1\nhlt\nf: ret\nL1: ret\n");
        let second = &code.instructions()[3];
        assert!(!second.flags.contains(InstFlags::NEVER_BR));
        assert!(!second.flags.contains(InstFlags::REDUNDANT_CC));
    }

    #[test]
    fn test_block_codes_recorded() {
        let code = Code::parse("cmpl $0, %eax\nje L1\nnop\nL1: ret\n");
        let main = code.main().unwrap();
        let root = code.block(main.block.unwrap());
        assert_eq!(root.initial_cc, CondCodes::NZP);
        assert_eq!(root.cc, CondCodes::NP);
    }
}
