//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use atlint::{AnalysisConfig, DEFAULT_MAX_ROUNDS, DEFAULT_SUBROUTINE_MARKER};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "atlint")]
#[command(about = "Static checker for AT&T-style teaching assembly")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check source files and report findings
    Check {
        /// Assembly source files
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Number of parallel jobs (0 = auto)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Also report informational findings
        #[arg(long)]
        all: bool,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Print the analysed program model of one file
    Dump {
        /// Assembly source file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Also print per-block register state
        #[arg(long)]
        registers: bool,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },
}

/// Analysis knobs shared by all commands.
#[derive(Args, Clone, Debug)]
pub struct AnalysisArgs {
    /// Maximum analysis rounds
    #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
    pub max_rounds: usize,

    /// Comment text marking the next label as a subroutine entry
    #[arg(long, default_value = DEFAULT_SUBROUTINE_MARKER)]
    pub marker: String,

    /// Ignore subroutine markers and trace from the program entry only
    #[arg(long)]
    pub no_subroutines: bool,
}

impl AnalysisArgs {
    pub fn config(&self) -> AnalysisConfig {
        AnalysisConfig::default()
            .with_max_rounds(self.max_rounds)
            .with_subroutine_marker(self.marker.clone())
            .with_subroutine_checking(!self.no_subroutines)
    }
}
