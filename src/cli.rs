//! CLI entry for Mend, defining the clap subcommands and dispatching each
//! command handler.

use clap::{Parser, Subcommand};

use crate::command;
use crate::internal::patch::PatchError;

// The Cli struct represents the root of the command line interface.
#[derive(Parser, Debug)]
#[command(
    about = "Mend: a unified-diff patch engine implemented in Rust",
    version = "0.1.0-pre"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// The subcommands that can be used with the CLI; each variant's args and
/// execute are defined in the `command` module.
#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Initialize a new repository")]
    Init(command::init::InitArgs),
    #[command(about = "Apply a patch to files and/or to the index")]
    Apply(command::apply::ApplyArgs),
}

/// Parse the command line (or the given args) and execute the matching
/// command. Returns the process exit code for patch-level outcomes; `Err` is
/// reserved for fatal conditions.
/// - `args`: parse from the command line if `None`, otherwise from the slice
pub fn parse(args: Option<&[&str]>) -> Result<i32, PatchError> {
    let cli = match args {
        Some(args) => Cli::try_parse_from(args)
            .map_err(|e| PatchError::Apply(e.to_string()))?,
        None => Cli::parse(),
    };

    match cli.command {
        Commands::Init(args) => {
            command::init::execute(args)?;
            Ok(0)
        }
        Commands::Apply(args) => {
            let errs = command::apply::execute(args)?;
            Ok(if errs { 1 } else { 0 })
        }
    }
}

/// Verify the CLI can be built without panicking, according to the
/// [clap docs](https://docs.rs/clap/latest/clap/_derive/_tutorial/chapter_4/index.html).
#[test]
fn verify_cli() {
    use clap::CommandFactory;

    Cli::command().debug_assert()
}
