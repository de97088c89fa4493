use anyhow::Result;
use clap::{Parser, Subcommand};
use gobuild::commands::{generate_command, inspect_command};
use gobuild::DEFAULT_TARGET;

/// Build-plan generator for Go command packages.
///
/// Reads JSON build options from `GOOPT`, resolves the target package and
/// its imports, and writes a cacheable graph of toolchain operations. All
/// substantive logic lives in `gobuild-core`.
#[derive(Parser, Debug)]
#[command(
    name = "gobuild",
    version,
    about = "Decompose a Go build into per-package toolchain operations",
    long_about = None
)]
struct Cli {
    /// Where to write the plan; `-` writes to stdout.
    #[arg(long, default_value = DEFAULT_TARGET)]
    target: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan the build described by `GOOPT` (the default).
    Generate,

    /// List the operations of a previously written plan.
    Inspect {
        /// Path to a plan written by `gobuild`.
        #[arg(long)]
        plan: String,

        /// Emit one JSON object per operation instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Generate) {
        Command::Generate => generate_command(&cli.target)?,
        Command::Inspect { plan, json } => inspect_command(&plan, json)?,
    }

    Ok(())
}
