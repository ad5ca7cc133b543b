//! Line parser: label split, mnemonic lookup and operand validation.

use crate::lexer::{LogicalLine, tokenize};
use crate::operand::is_identifier;
use crate::{
    Branch, Immediate, InstFlags, Instruction, OpKind, OpSpec, Operand, OperandClass, Shape, Width,
    lookup,
};

/// A logical line split into its optional label and statement.
#[derive(Clone, Debug, Default)]
pub struct ParsedLine {
    pub label: Option<String>,
    pub instruction: Option<Instruction>,
}

/// Parse one logical line.
///
/// A label shares its line with at most one statement; the statement
/// then carries [`InstFlags::SHARES_LINE_WITH_LABEL`].
#[must_use]
pub fn parse_line(line: &LogicalLine) -> ParsedLine {
    let text = line.text.trim();
    if text.is_empty() {
        return ParsedLine::default();
    }
    let (label, rest) = split_label(text);
    let instruction = (!rest.is_empty()).then(|| {
        let mut instr = parse_instruction(rest, line.line);
        if label.is_some() {
            instr.flags.insert(InstFlags::SHARES_LINE_WITH_LABEL);
        }
        instr
    });
    ParsedLine { label: label.map(str::to_string), instruction }
}

fn split_label(text: &str) -> (Option<&str>, &str) {
    if let Some(colon) = text.find(':') {
        let name = text[..colon].trim();
        if is_identifier(name) {
            return (Some(name), text[colon + 1..].trim());
        }
    }
    (None, text)
}

/// Parse a statement without a label.
///
/// Never fails: malformed input is reported through the instruction's
/// flags and operands that do not fit the mnemonic's shape are dropped.
#[must_use]
pub fn parse_instruction(text: &str, line: u32) -> Instruction {
    let tokens = tokenize(text);
    let mnemonic = tokens.first().map(|t| t.to_ascii_lowercase()).unwrap_or_default();
    let args = tokens.get(1..).unwrap_or_default();
    let mut instr = Instruction::new(line, text, mnemonic);

    let Some(spec) = lookup(&instr.mnemonic) else {
        instr.flags.insert(InstFlags::NONEXISTENT);
        instr.operands = args.iter().map(|a| Operand::classify(a).0).collect();
        instr.size = 1;
        return instr;
    };
    instr.kind = spec.kind;
    instr.spec = Some(spec);

    match spec.shape {
        Shape::Nullary => {
            expect_count(&mut instr, args, 0, 0);
        }
        Shape::Unary | Shape::Binary | Shape::UnaryOrBinary => {
            let (min, max) = match spec.shape {
                Shape::Unary => (1, 1),
                Shape::Binary => (2, 2),
                _ => (1, 2),
            };
            if expect_count(&mut instr, args, min, max) {
                classify_all(&mut instr, args);
                check_operand_pair(&mut instr);
            }
        }
        Shape::Frame => {
            if expect_count(&mut instr, args, 2, 2) {
                classify_all(&mut instr, args);
                if instr.operands.iter().any(|op| op.class() != OperandClass::Immediate) {
                    instr.flags.insert(InstFlags::INCOMPLETE);
                }
            }
        }
        Shape::Target => {
            if expect_count(&mut instr, args, 1, 1) {
                let (op, mut flags) = Operand::classify(args[0]);
                flags.remove(InstFlags::MISSING_IMM_PREFIX);
                if op.class() == OperandClass::Immediate {
                    flags.insert(InstFlags::INCOMPLETE);
                }
                instr.flags.insert(flags);
                instr.operands.push(op);
            }
        }
        Shape::Values => {
            if expect_count(&mut instr, args, 1, usize::MAX) {
                parse_values(&mut instr, args);
            }
        }
        Shape::Alignment => {
            if expect_count(&mut instr, args, 1, 1) {
                parse_values(&mut instr, args);
                let align = instr.operands.first().and_then(Operand::immediate);
                match align.and_then(Immediate::number).and_then(|n| u32::try_from(n).ok()) {
                    Some(n) if n > 0 => instr.align = Some(n),
                    _ => instr.flags.insert(InstFlags::INCOMPLETE),
                }
            }
        }
        Shape::Symbol => {
            if expect_count(&mut instr, args, 1, 1) {
                if is_identifier(args[0]) {
                    instr.operands.push(Operand::classify(args[0]).0);
                } else {
                    instr.flags.insert(InstFlags::INCOMPLETE);
                }
            }
        }
        Shape::Strings => {
            if expect_count(&mut instr, args, 1, usize::MAX) {
                parse_strings(&mut instr, args);
            }
        }
    }

    if spec.branch == Some(Branch::Jump) {
        instr.flags.insert(InstFlags::ALWAYS_BR);
    }
    check_width(&mut instr, spec);
    instr.size = unit_size(&instr, spec);
    instr
}

/// Set the argument-count flag unless `min..=max` operands are present.
fn expect_count(instr: &mut Instruction, args: &[&str], min: usize, max: usize) -> bool {
    let ok = (min..=max).contains(&args.len());
    if !ok {
        instr.flags.insert(InstFlags::BAD_ARG_COUNT);
    }
    ok
}

fn classify_all(instr: &mut Instruction, args: &[&str]) {
    for arg in args {
        let (op, flags) = Operand::classify(arg);
        instr.flags.insert(flags);
        instr.operands.push(op);
    }
}

fn check_operand_pair(instr: &mut Instruction) {
    if let [src, dst] = instr.operands.as_slice() {
        match (src.class(), dst.class()) {
            (OperandClass::Memory, OperandClass::Memory) => {
                instr.flags.insert(InstFlags::MEMORY_TWICE);
            }
            (OperandClass::Immediate, OperandClass::Immediate) => {
                instr.flags.insert(InstFlags::IMMEDIATE_TWICE);
            }
            _ => {}
        }
    }
}

/// Numeric directive values; the `$` prefix is optional here.
fn parse_values(instr: &mut Instruction, args: &[&str]) {
    for arg in args {
        let literal = arg.strip_prefix('$').unwrap_or(arg);
        if let Some(imm) = Immediate::parse(literal) {
            instr.operands.push(Operand::Immediate(imm));
        } else {
            instr.flags.insert(InstFlags::INCOMPLETE);
            instr.operands.push(Operand::Invalid((*arg).to_string()));
        }
    }
}

fn parse_strings(instr: &mut Instruction, args: &[&str]) {
    for arg in args {
        let closed = arg.len() >= 2 && arg.starts_with('"') && arg.ends_with('"');
        if !closed {
            instr.flags.insert(InstFlags::INCOMPLETE);
        }
        instr.strings.push((*arg).to_string());
    }
}

/// Byte length of a string literal, each escape sequence counting once.
#[must_use]
pub fn string_byte_len(literal: &str) -> u32 {
    let body = literal.strip_prefix('"').unwrap_or(literal);
    let body = body.strip_suffix('"').unwrap_or(body);
    let mut len = 0u32;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if chars.next().is_some_and(|e| e.is_digit(8)) {
                for _ in 0..2 {
                    if chars.next_if(|d| d.is_digit(8)).is_none() {
                        break;
                    }
                }
            }
            len += 1;
        } else {
            len += u32::try_from(c.len_utf8()).unwrap_or(1);
        }
    }
    len
}

/// Register operands must match the suffix width; `q` is unsupported.
fn check_width(instr: &mut Instruction, spec: OpSpec) {
    let width = match spec.kind {
        OpKind::DirectiveNumber => spec.width.unwrap_or(Width::Long),
        _ if instr.is_code() => {
            if spec.width == Some(Width::Quad) {
                instr.flags.insert(InstFlags::UNSUPPORTED_WIDTH);
                return;
            }
            spec.width.unwrap_or(Width::Long)
        }
        _ => return,
    };
    let (lo, hi) = width.immediate_range();
    let skip_count = spec.count_operand && instr.operands.len() == 2;
    let mut flags = InstFlags::NONE;
    for (i, op) in instr.operands.iter().enumerate() {
        match op {
            Operand::Register(reg) if spec.width.is_some() && !(skip_count && i == 0) => {
                if reg.width != width {
                    flags.insert(InstFlags::SIZE_MISMATCH);
                }
            }
            Operand::Immediate(imm) => {
                if imm.number().is_some_and(|n| n < lo || n > hi) {
                    flags.insert(InstFlags::IMMEDIATE_OUT_OF_RANGE);
                }
            }
            _ => {}
        }
    }
    instr.flags.insert(flags);
}

fn unit_size(instr: &Instruction, spec: OpSpec) -> u32 {
    match spec.kind {
        OpKind::DirectiveNumber => {
            let count = u32::try_from(instr.operands.len()).unwrap_or(u32::MAX);
            count.saturating_mul(spec.width.map_or(4, Width::bytes))
        }
        OpKind::DirectiveString => {
            let terminators = u32::from(instr.mnemonic != ".ascii");
            instr
                .strings
                .iter()
                .map(|s| string_byte_len(s) + terminators)
                .sum()
        }
        kind if kind.is_code() => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CondCodes, Reg, lexer::logical_lines};

    fn parse(text: &str) -> Instruction {
        parse_instruction(text, 0)
    }

    #[test]
    fn test_parse_binary() {
        let i = parse("movl $5, %eax");
        assert_eq!(i.kind, OpKind::Move);
        assert_eq!(i.operands.len(), 2);
        assert_eq!(i.destination().and_then(Operand::register).map(|r| r.reg), Some(Reg::Eax));
        assert!(i.flags.is_empty());
        assert_eq!(i.size, 1);
    }

    #[test]
    fn test_mnemonic_case_insensitive() {
        let i = parse("MOVL $5, %EAX");
        assert_eq!(i.mnemonic, "movl");
        assert!(i.flags.is_empty());
    }

    #[test]
    fn test_wrong_operand_count_does_not_abort() {
        let i = parse("addl %eax");
        assert!(i.flags.contains(InstFlags::BAD_ARG_COUNT));
        assert!(i.operands.is_empty());
        assert_eq!(i.kind, OpKind::Arithmetic);
        assert!(!i.sets_cc());
    }

    #[test]
    fn test_memory_and_immediate_twice() {
        assert!(parse("movl a, b").flags.contains(InstFlags::MEMORY_TWICE));
        assert!(parse("cmpl $1, $2").flags.contains(InstFlags::IMMEDIATE_TWICE));
    }

    #[test]
    fn test_missing_prefixes() {
        assert!(parse("movl 5, %eax").flags.contains(InstFlags::MISSING_IMM_PREFIX));
        assert!(parse("movl $5, eax").flags.contains(InstFlags::MISSING_REG_PREFIX));
        assert!(!parse("jmp 5").flags.contains(InstFlags::MISSING_IMM_PREFIX));
    }

    #[test]
    fn test_unknown_mnemonic() {
        let i = parse("frob %eax");
        assert!(i.flags.contains(InstFlags::NONEXISTENT));
        assert_eq!(i.kind, OpKind::Unknown);
    }

    #[test]
    fn test_width_checks() {
        assert!(parse("movb %eax, %ebx").flags.contains(InstFlags::SIZE_MISMATCH));
        assert!(parse("movw %ax, %bx").flags.is_empty());
        assert!(parse("shll %cl, %eax").flags.is_empty());
        assert!(parse("movq $1, %eax").flags.contains(InstFlags::UNSUPPORTED_WIDTH));
        assert!(parse("movb $300, %al").flags.contains(InstFlags::IMMEDIATE_OUT_OF_RANGE));
        assert!(parse("movl $4294967296, %eax").flags.contains(InstFlags::IMMEDIATE_OUT_OF_RANGE));
        assert!(parse("movl $-1, %eax").flags.is_empty());
    }

    #[test]
    fn test_branches() {
        let jmp = parse("jmp done");
        assert!(jmp.flags.contains(InstFlags::ALWAYS_BR));
        assert_eq!(jmp.target_symbol(), Some("done"));
        assert!(!jmp.has_fallthrough());

        let je = parse("je done");
        assert_eq!(je.cc_effect(), CondCodes::Z);
        assert!(je.has_fallthrough());

        let indirect = parse("jmp *%eax");
        assert_eq!(indirect.target_symbol(), None);
        assert!(!indirect.flags.contains(InstFlags::INCOMPLETE));
        assert_eq!(indirect.to_string(), "jmp *%eax");
        assert!(indirect.effects().reads.contains(Reg::Eax));

        let rel = parse("jmp 3");
        assert_eq!(rel.target_offset(), Some(3));
    }

    #[test]
    fn test_directive_sizes() {
        assert_eq!(parse(".long 1, 2, 3").size, 12);
        assert_eq!(parse(".byte 'a', 0x10").size, 2);
        assert_eq!(parse(".quad 7").size, 8);
        assert_eq!(parse(".ascii \"ab\\n\"").size, 3);
        assert_eq!(parse(".asciz \"ab\"").size, 3);
        assert_eq!(parse(".string \"\\101\"").size, 2);
        assert_eq!(parse(".globl main").size, 0);
        assert!(parse(".byte 256").flags.contains(InstFlags::IMMEDIATE_OUT_OF_RANGE));
    }

    #[test]
    fn test_align() {
        let i = parse(".align 4");
        assert_eq!(i.align, Some(4));
        assert!(parse(".align 0").flags.contains(InstFlags::INCOMPLETE));
    }

    #[test]
    fn test_label_split() {
        let lines = logical_lines("loop:  decl %ecx\nend:\n");
        let first = parse_line(&lines[0]);
        assert_eq!(first.label.as_deref(), Some("loop"));
        let instr = first.instruction.unwrap();
        assert_eq!(instr.mnemonic, "decl");
        assert!(instr.flags.contains(InstFlags::SHARES_LINE_WITH_LABEL));

        let second = parse_line(&lines[1]);
        assert_eq!(second.label.as_deref(), Some("end"));
        assert!(second.instruction.is_none());
    }

    #[test]
    fn test_label_with_string_containing_colon() {
        let lines = logical_lines("msg: .ascii \"a:b\"");
        let parsed = parse_line(&lines[0]);
        assert_eq!(parsed.label.as_deref(), Some("msg"));
        assert_eq!(parsed.instruction.unwrap().size, 3);
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["movl $0x10, -4(%ebp)", "leal table(,%ecx,4), %esi", "jne loop", "call *%edx", "ret"] {
            let first = parse(text);
            let again = parse(&first.to_string());
            assert_eq!(first.kind, again.kind, "{text}");
            assert_eq!(first.operands, again.operands, "{text}");
            assert_eq!(first.flags, again.flags, "{text}");
        }
    }
}
