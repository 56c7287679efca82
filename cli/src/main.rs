use anyhow::Result;
use clap::Parser;

use cli::args::{Cli, Commands};
use cli::commands::{check, run};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            paths,
            debug_ast,
            debug_disassembly,
            debug,
            no_color,
        } => run::run_files(
            &paths,
            debug_ast || debug,
            debug_disassembly || debug,
            no_color,
        ),
        Commands::Check {
            paths,
            debug_ast,
            no_color,
        } => check::check_files(&paths, debug_ast, no_color),
    }
}
