//! Dump command: print the analysed program model.

use std::fmt::Write as _;
use std::path::Path;

use tracing::error;

use atlint::{AnalysisConfig, Access, Code, InstFlags, Reg, SaveFlags};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};

/// Handle the `dump` command.
pub fn cmd_dump(file: &Path, registers: bool, config: &AnalysisConfig) -> i32 {
    let source = match std::fs::read_to_string(file) {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, path = %file.display(), "failed to read source");
            return EXIT_FAILURE;
        }
    };
    let code = match atlint::analyze_with(&source, config) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return EXIT_FAILURE;
        }
    };
    print!("{}", render(&code, registers));
    EXIT_SUCCESS
}

fn render(code: &Code, registers: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "rounds: {}", code.rounds());
    for (name, mark) in [
        (".data", code.data_section()),
        (".text", code.text_section()),
        (".end", code.end_marker()),
    ] {
        if let Some(mark) = mark {
            let _ = writeln!(out, "{name} line {} addr {:#x}", mark.line + 1, mark.address);
        }
    }

    let _ = writeln!(out, "\ninstructions:");
    for instr in code.instructions() {
        let owner = instr.subroutine.map_or_else(|| "-".to_string(), |s| format!("{s:#x}"));
        let mut flags = instr.flags;
        flags.remove(InstFlags::FOUND);
        let _ = write!(
            out,
            "{:4} {:#06x} {:>6} {:<28}",
            instr.line + 1,
            instr.address,
            owner,
            instr.to_string()
        );
        if !flags.is_empty() {
            let _ = write!(out, " {flags}");
        }
        if let Some(overlap) = instr.overlap {
            let _ = write!(out, " overlap={overlap:#x}");
        }
        out.push('\n');
    }

    let _ = writeln!(out, "\nlabels:");
    for label in code.labels() {
        let target = label
            .instruction
            .map_or_else(|| "-".to_string(), |id| (code.instruction(id).line + 1).to_string());
        let _ = writeln!(
            out,
            "  {:<16} line {:4} addr {:#06x} -> {target}",
            label.name,
            label.line + 1,
            label.address
        );
    }

    let _ = writeln!(out, "\nsubroutines:");
    for sub in code.subroutines() {
        let exits: Vec<String> = code.exits(sub).iter().map(|b| b.0.to_string()).collect();
        let overlaps: Vec<String> = sub.overlaps.iter().map(|o| format!("{o:#x}")).collect();
        let _ = writeln!(
            out,
            "  {:<16} id {:#06x} block {} exits [{}] overlaps [{}]",
            sub.display_name(),
            sub.id,
            sub.block.map_or_else(|| "-".to_string(), |b| b.0.to_string()),
            exits.join(", "),
            overlaps.join(", ")
        );
    }

    let _ = writeln!(out, "\nblocks:");
    for (i, block) in code.blocks().iter().enumerate() {
        let lines: Vec<String> = block
            .instructions
            .iter()
            .map(|id| (code.instruction(*id).line + 1).to_string())
            .collect();
        let link = |b: Option<atlint::BlockId>| b.map_or_else(|| "-".to_string(), |b| b.0.to_string());
        let _ = writeln!(
            out,
            "  #{i:<3} lines [{}] next {} branch {} cc {} -> {}",
            lines.join(", "),
            link(block.next),
            link(block.branch),
            block.initial_cc,
            block.cc
        );
        if registers {
            for reg in Reg::ALL {
                let status = block.register(reg);
                if status.access == Access::NONE && status.save == SaveFlags::NONE {
                    continue;
                }
                let _ = writeln!(
                    out,
                    "        %{:<4} {} {}",
                    reg.name(),
                    access_name(status.access),
                    save_name(status.save)
                );
            }
        }
    }
    out
}

const fn access_name(access: Access) -> &'static str {
    match access {
        Access::WRITE => "write",
        Access::READ => "read",
        Access::BOTH => "read/write",
        _ => "-",
    }
}

fn save_name(save: SaveFlags) -> String {
    let mut parts = Vec::new();
    if save.contains(SaveFlags::SAVED) {
        parts.push("saved");
    }
    if save.contains(SaveFlags::RESTORED) {
        parts.push("restored");
    }
    if save.contains(SaveFlags::INPUT) {
        parts.push("input");
    }
    parts.join("+")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_model() {
        let code = atlint::analyze("main: movl $1, %eax\nmovl $2, %eax\nret\n");
        let text = render(&code, true);
        assert!(text.contains("main"));
        assert!(text.contains("dead"));
        assert!(text.contains("%eax"));
    }
}
