//! Instruction-level control flow links and subroutine entry marking.

use tracing::{trace, trace_span};

use atlint_isa::{InstFlags, InstrId, OpKind};

use crate::Code;

/// Set `next` and `jump_target` on every executable statement.
///
/// `.globl`, `.align` and section markers are transparent to fallthrough;
/// `.end` stops it. Branches already known never to be taken get no target.
pub(crate) fn link(code: &mut Code) {
    let _span = trace_span!("link").entered();
    let n = code.instructions.len();

    let mut following = vec![None; n];
    let mut next = None;
    for i in (0..n).rev() {
        following[i] = next;
        match code.instructions[i].kind {
            OpKind::DirectiveEnd => next = None,
            OpKind::DirectiveGlobal
            | OpKind::DirectiveAlign
            | OpKind::DirectiveData
            | OpKind::DirectiveText => {}
            _ => next = Some(InstrId(i)),
        }
    }

    let mut unresolved = 0usize;
    for (i, fall) in following.into_iter().enumerate() {
        let instr = &code.instructions[i];
        if !instr.is_code() {
            continue;
        }
        let fall = fall.filter(|_| instr.has_fallthrough());
        let target = if instr.flags.contains(InstFlags::NEVER_BR) {
            None
        } else if let Some(symbol) = instr.target_symbol() {
            let target = code.find_label_by_name(symbol).and_then(|l| l.instruction);
            if target.is_none() {
                unresolved += 1;
            }
            target
        } else {
            instr.dest_addr.and_then(|addr| code.instruction_at(addr))
        };
        let instr = &mut code.instructions[i];
        instr.next = fall;
        instr.jump_target = target;
    }
    trace!(unresolved, "links built");
}

/// Flag labelled statements whose preceding line carries the marker.
pub(crate) fn mark_subroutines(code: &mut Code) {
    for line in code.marker_lines.clone() {
        let Some(id) = code
            .find_label_by_line(line + 1)
            .and_then(|l| l.instruction)
        else {
            continue;
        };
        let instr = &mut code.instructions[id.0];
        if !instr.is_code() {
            continue;
        }
        instr.flags.insert(InstFlags::SUBROUTINE_START);
        instr.subroutine = Some(instr.address);
    }
}

#[cfg(test)]
mod tests {
    use crate::Code;

    #[test]
    fn test_jmp_has_target_and_no_next() {
        let code = Code::parse("start: nop\njmp start\nnop\n");
        let jmp = &code.instructions()[1];
        assert_eq!(jmp.jump_target.map(|t| t.0), Some(0));
        assert_eq!(jmp.next, None);
    }

    #[test]
    fn test_conditional_has_both() {
        let code = Code::parse("cmpl $0, %eax\nje done\nnop\ndone: ret\n");
        let je = &code.instructions()[1];
        assert_eq!(je.jump_target.map(|t| t.0), Some(3));
        assert_eq!(je.next.map(|t| t.0), Some(2));
    }

    #[test]
    fn test_globl_is_transparent_and_end_stops() {
        let code = Code::parse("nop\n.globl main\nnop\n.end\nnop\n");
        assert_eq!(code.instructions()[0].next.map(|t| t.0), Some(2));
        assert_eq!(code.instructions()[2].next, None);
    }

    #[test]
    fn test_subroutine_marker() {
        let code = Code::parse("call f\nhlt\n# @SUBROUTINE\nf: ret\n");
        let f = code.find_label_by_name("f").unwrap().instruction.unwrap();
        assert!(code.instruction(f).flags.contains(atlint_isa::InstFlags::SUBROUTINE_START));
    }
}
