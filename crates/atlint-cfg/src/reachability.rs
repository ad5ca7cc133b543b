//! Reachability tracing from the program entry and each subroutine entry.

use tracing::{trace, trace_span};

use atlint_isa::{InstFlags, InstrId};

use crate::{Code, Subroutine};

/// Trace every root and record the roots on the program.
///
/// The walk uses an explicit stack. Reaching code already owned by a
/// different routine records overlap instead of re-stamping it, and the
/// entry of another subroutine is never descended into.
pub(crate) fn trace_all(code: &mut Code) {
    let _span = trace_span!("reachability").entered();
    let mut roots = Vec::new();
    if let Some(entry) = code.entry {
        roots.push(root_for(code, entry, true));
    }
    for (i, instr) in code.instructions.iter().enumerate() {
        if instr.flags.contains(InstFlags::SUBROUTINE_START) && Some(InstrId(i)) != code.entry {
            roots.push(root_for(code, InstrId(i), false));
        }
    }

    let mut stack = Vec::new();
    for root in &roots {
        trace_from(code, root.entry, root.id, &mut stack);
    }
    trace!(roots = roots.len(), "reachability traced");
    code.subroutines = roots;
}

fn root_for(code: &Code, entry: InstrId, is_main: bool) -> Subroutine {
    let address = code.instructions[entry.0].address;
    let name = code
        .labels
        .iter()
        .find(|l| l.instruction == Some(entry))
        .map(|l| l.name.clone());
    Subroutine::new(address, entry, name, is_main)
}

fn trace_from(code: &mut Code, root: InstrId, id: u32, stack: &mut Vec<InstrId>) {
    {
        let instr = &mut code.instructions[root.0];
        if instr.flags.contains(InstFlags::FOUND) {
            if instr.subroutine != Some(id) {
                instr.overlap = Some(id);
            }
            return;
        }
        instr.flags.insert(InstFlags::FOUND);
        instr.subroutine = Some(id);
    }
    stack.push(root);
    while let Some(cur) = stack.pop() {
        let (next, target, is_call) = {
            let instr = &code.instructions[cur.0];
            (instr.next, instr.jump_target, instr.is_call())
        };
        if let Some(next) = next {
            visit(code, next, id, false, stack);
        }
        if let Some(target) = target {
            visit(code, target, id, is_call, stack);
        }
    }
}

fn visit(code: &mut Code, at: InstrId, id: u32, via_call: bool, stack: &mut Vec<InstrId>) {
    let instr = &mut code.instructions[at.0];
    if !instr.is_code() {
        return;
    }
    if instr.flags.contains(InstFlags::SUBROUTINE_START) {
        if !via_call && instr.subroutine != Some(id) {
            instr.overlap = Some(id);
        }
        return;
    }
    if !instr.flags.contains(InstFlags::FOUND) {
        instr.flags.insert(InstFlags::FOUND);
        instr.subroutine = Some(id);
        stack.push(at);
    } else if instr.subroutine != Some(id) {
        instr.overlap = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use atlint_isa::InstFlags;

    use crate::Code;

    #[test]
    fn test_unreachable_after_jump() {
        let code = Code::parse("jmp end\nnop\nend: ret\n");
        let found: Vec<bool> = code
            .instructions()
            .iter()
            .map(|i| i.flags.contains(InstFlags::FOUND))
            .collect();
        assert_eq!(found, vec![true, false, true]);
    }

    #[test]
    fn test_marked_subroutine_traced_from_own_root() {
        let src = "call f\nhlt\n; @SUBROUTINE\nf: movl $1, %eax\nret\n";
        let code = Code::parse(src);
        assert_eq!(code.subroutines().len(), 2);
        let f = &code.subroutines()[1];
        assert_eq!(f.name.as_deref(), Some("f"));
        assert_eq!(f.id, 2);
        let ret = &code.instructions()[3];
        assert_eq!(ret.subroutine, Some(2));
        assert!(ret.flags.contains(InstFlags::FOUND));
        assert!(code.subroutines()[0].overlaps.is_empty());
    }

    #[test]
    fn test_disabled_subroutine_checking_follows_calls() {
        let config = crate::AnalysisConfig::default().with_subroutine_checking(false);
        let src = "call f\nhlt\n; @SUBROUTINE\nf: ret\n";
        let code = Code::with_config(src, &config).unwrap();
        assert_eq!(code.subroutines().len(), 1);
        assert_eq!(code.instructions()[2].subroutine, Some(0));
    }
}
