//! atlint CLI - assembly checker

mod cli;
mod commands;
mod terminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use cli::Cli;

const LOG_TARGETS: [&str; 3] = ["atlint", "atlint_cfg", "atlint_isa"];

fn main() {
    let cli = Cli::parse();

    // Default level for our crates; RUST_LOG still overrides per target
    let level = if cli.verbose {
        "debug"
    } else if cli.silent {
        "warn"
    } else {
        "info"
    };
    let mut filter = EnvFilter::from_default_env();
    for target in LOG_TARGETS {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let exit_code = commands::run_command(&cli);
    std::process::exit(exit_code);
}
