//! Command implementations.
//!
//! Each submodule handles one CLI command.

mod check;
mod dump;

use crate::cli::{Cli, Commands};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Check {
            files,
            jobs,
            all,
            analysis,
        } => check::cmd_check(files, *jobs, *all, &analysis.config(), cli.silent),
        Commands::Dump {
            file,
            registers,
            analysis,
        } => dump::cmd_dump(file, *registers, &analysis.config()),
    }
}
