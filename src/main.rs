// File: src/main.rs
//
// Main entry point for the Quill programming language interpreter.
// Handles command-line argument parsing and dispatches to the
// appropriate subcommand (run or repl).

use clap::{Parser as ClapParser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use quill::{repl, run_source};

#[derive(ClapParser)]
#[command(
    name = "quill",
    about = "Quill: a small scripting language with scope-qualified namespaces",
    version = env!("CARGO_PKG_VERSION"),
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[command(arg_required_else_help = true)]
enum Commands {
    /// Run a Quill script file
    Run {
        /// Path to the .quill file
        file: PathBuf,
    },

    /// Launch the interactive Quill REPL
    Repl,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file } => run_file(&file),
        Commands::Repl => match repl::Repl::new() {
            Ok(mut repl) => match repl.run() {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("REPL error: {}", err);
                    ExitCode::FAILURE
                }
            },
            Err(err) => {
                eprintln!("Cannot start REPL: {}", err);
                ExitCode::FAILURE
            }
        },
    }
}

fn run_file(file: &PathBuf) -> ExitCode {
    let source_name = file.display().to_string();
    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Cannot open file '{}': {}", source_name, err);
            return ExitCode::FAILURE;
        }
    };

    let (_results, diagnostics) = run_source(&source, &source_name);

    let mut failed = false;
    for diagnostic in &diagnostics {
        eprintln!("{}", diagnostic.render());
        failed = failed || diagnostic.is_error();
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
