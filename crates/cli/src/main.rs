//! Entry point for the command-line interface.
//! Delegates to dedicated modules for argument handling,
//! analysis, scanning and output formatting.

use std::process::ExitCode;

use jsrecon::analyze::run_analyze;
use jsrecon::args::{parse_cli, Commands};
use jsrecon::inspect::{dump_ast, dump_cfg};
use jsrecon::init_tracing;
use jsrecon::scan::run_scan;

fn main() -> anyhow::Result<ExitCode> {
    let cli = parse_cli();
    init_tracing(cli.debug, cli.quiet);
    let threshold_hit = match cli.command {
        Commands::Analyze(args) => run_analyze(args)?,
        Commands::Scan(args) => run_scan(args)?,
        Commands::Ast(args) => {
            dump_ast(args)?;
            false
        }
        Commands::Cfg(args) => {
            dump_cfg(args)?;
            false
        }
    };
    Ok(if threshold_hit {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
