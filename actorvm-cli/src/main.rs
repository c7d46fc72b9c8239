//! actorvm CLI: assemble, disassemble, verify and run behavior programs.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Input/decode/assembly error
//! - 2: Verification failure
//! - 3: Runtime error

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "actorvm", version, about = "Actor behavior bytecode toolchain")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a text program into a binary image
    Assemble {
        input: PathBuf,
        /// Output path (defaults to the input with an .avmb extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a program as assembly text
    Disassemble { input: PathBuf },
    /// Statically check a program
    Verify { input: PathBuf },
    /// Verify a program and run it against an in-memory world
    Run(commands::RunArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Assemble { input, output } => commands::assemble(&input, output.as_deref()),
        Command::Disassemble { input } => commands::disassemble(&input),
        Command::Verify { input } => commands::verify(&input),
        Command::Run(args) => commands::run(&args),
    };

    if let Err(code) = result {
        process::exit(code);
    }
}
