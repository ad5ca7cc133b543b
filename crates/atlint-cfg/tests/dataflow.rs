//! Register and condition-code passes over whole programs.

use atlint_cfg::{AnalysisConfig, BlockFlags, Code, CondCodes, InstFlags, Reg, SaveFlags};

fn flagged(code: &Code, flag: InstFlags) -> Vec<usize> {
    code.instructions()
        .iter()
        .enumerate()
        .filter(|(_, i)| i.flags.contains(flag))
        .map(|(n, _)| n)
        .collect()
}

#[test]
fn test_dead_store() {
    let code = Code::parse("movl $1, %eax\nmovl $2, %eax\nret\n");
    assert_eq!(flagged(&code, InstFlags::DEAD), vec![0]);
}

#[test]
fn test_store_live_on_one_path_is_kept() {
    let src = "\
    movl $1, %eax
    cmpl $0, %ebx
    je skip
    movl $2, %eax
skip:
    ret
";
    let code = Code::parse(src);
    assert!(flagged(&code, InstFlags::DEAD).is_empty());
}

#[test]
fn test_store_dead_on_every_path() {
    let src = "\
    movl $1, %eax
    cmpl $0, %ebx
    je other
    movl $2, %eax
    ret
other:
    movl $3, %eax
    ret
";
    let code = Code::parse(src);
    assert_eq!(flagged(&code, InstFlags::DEAD), vec![0]);
}

#[test]
fn test_call_clobbers_but_reads() {
    let code = Code::parse("movl $1, %eax\ncall f\nmovl $2, %eax\nret\nf: ret\n");
    assert!(!code.instructions()[0].flags.contains(InstFlags::DEAD));
}

#[test]
fn test_store_read_on_next_iteration_is_kept() {
    let src = "\
    movl $5, %ecx
    xorl %eax, %eax
loop:
    addl %eax, %ebx
    movl $7, %eax
    decl %ecx
    jne loop
    movl $1, %eax
    ret
";
    let code = Code::parse(src);
    assert!(!code.instructions()[3].flags.contains(InstFlags::DEAD));
    assert!(flagged(&code, InstFlags::DEAD).is_empty());
}

#[test]
fn test_back_edge_from_later_block() {
    let src = "\
    movl $3, %ecx
    xorl %eax, %eax
top:
    addl %eax, %ebx
    movl $7, %eax
    testl %ecx, %ecx
    je skip
    movl $1, %esi
    movl $2, %esi
skip:
    decl %ecx
    jne top
    ret
";
    let code = Code::parse(src);
    assert_eq!(flagged(&code, InstFlags::DEAD), vec![6]);
}

#[test]
fn test_redundant_condition_test() {
    let code = Code::parse("cmpl $0, %eax\nje L1\nje L1\nnop\nL1: ret\n");
    let second = &code.instructions()[2];
    assert!(second.flags.contains(InstFlags::REDUNDANT_CC));
    assert_eq!(second.redundant_cc, CondCodes::Z);
    assert!(!code.instructions()[1].flags.contains(InstFlags::REDUNDANT_CC));
}

#[test]
fn test_arithmetic_resets_condition_codes() {
    let code = Code::parse("cmpl $0, %eax\nje L1\naddl $1, %eax\nje L1\nnop\nL1: ret\n");
    assert!(flagged(&code, InstFlags::REDUNDANT_CC).is_empty());
    assert!(flagged(&code, InstFlags::NEVER_BR).is_empty());
}

#[test]
fn test_always_taken_drops_fallthrough_code() {
    let code = Code::parse("cmpl $0, %eax\njle a\njg b\nnop\na: nop\nb: ret\n");
    let jg = &code.instructions()[2];
    assert!(jg.flags.contains(InstFlags::ALWAYS_BR));
    assert!(jg.next.is_none());
    assert!(!code.instructions()[3].flags.contains(InstFlags::FOUND));
}

#[test]
fn test_fixed_point_is_idempotent() {
    let src = "\
    movl $10, %ecx
    xorl %eax, %eax
loop:
    addl %ecx, %eax
    decl %ecx
    jne loop
    cmpl $0, %eax
    jl neg
    jge done
neg:
    negl %eax
done:
    call helper
    ret
; @SUBROUTINE
helper:
    pushl %ebx
    movl %eax, %ebx
    popl %ebx
    ret
";
    let mut code = Code::parse(src);
    let rounds = code.rounds();
    assert!(rounds <= code.config().max_rounds);
    let blocks: Vec<_> = code.blocks().iter().map(|b| (b.instructions.clone(), b.cc)).collect();
    assert!(!code.reanalyze());
    let again: Vec<_> = code.blocks().iter().map(|b| (b.instructions.clone(), b.cc)).collect();
    assert_eq!(blocks, again);
    for block in code.blocks() {
        assert!(block.flags.contains(BlockFlags::CHECKED_BACKWARD));
        assert!(block.flags.contains(BlockFlags::CHECKED_FORWARD));
    }
}

#[test]
fn test_round_ceiling() {
    let config = AnalysisConfig::default().with_max_rounds(1);
    let code = Code::with_config("cmpl $0, %eax\nje L1\nje L1\nL1: ret\n", &config).unwrap();
    assert_eq!(code.rounds(), 1);
}

#[test]
fn test_callee_saved_register() {
    let src = "\
    call f
    hlt
; @SUBROUTINE
f:
    pushl %esi
    movl $0, %esi
    popl %esi
    ret
";
    let code = Code::parse(src);
    let f = code.subroutines().iter().find(|s| !s.is_main).unwrap();
    let entry = code.block(f.block.unwrap());
    let esi = entry.register(Reg::Esi);
    assert!(esi.save.contains(SaveFlags::SAVED_AND_RESTORED));
    assert_eq!(esi.restored_from.as_deref(), Some("stack"));
    assert!(!esi.save.contains(SaveFlags::INPUT));
}

#[test]
fn test_uninitialised_read_is_input() {
    let code = Code::parse("addl %ebx, %eax\nret\n");
    let main = code.main().unwrap();
    let entry = code.block(main.block.unwrap());
    assert!(entry.register(Reg::Ebx).save.contains(SaveFlags::INPUT));
    assert!(entry.register(Reg::Eax).save.contains(SaveFlags::INPUT));
    assert!(!entry.register(Reg::Ecx).save.contains(SaveFlags::INPUT));
}
