use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "twill")]
#[command(about = "A small scripting language with typed functions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interpret file(s) and output any results
    #[command(alias = "r")]
    Run {
        /// Paths to .twl source files
        paths: Vec<String>,
        /// Show a representation of the analyzed syntax tree
        #[arg(long)]
        debug_ast: bool,
        /// Show the disassembled bytecode emitted by the compiler
        #[arg(long)]
        debug_disassembly: bool,
        /// Alias for --debug-ast --debug-disassembly
        #[arg(long)]
        debug: bool,
        /// Hide colors in error and warning messages
        #[arg(long)]
        no_color: bool,
    },
    /// Check syntax and type relationships of file(s) without executing
    #[command(alias = "c")]
    Check {
        /// Paths to .twl source files
        paths: Vec<String>,
        /// Show a representation of the analyzed syntax tree
        #[arg(long)]
        debug_ast: bool,
        /// Hide colors in error and warning messages
        #[arg(long)]
        no_color: bool,
    },
}
