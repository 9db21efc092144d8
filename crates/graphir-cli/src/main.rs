//! Graphir CLI - lowers traversal step trees and decodes engine results.
//!
//! Traversals and results are read as JSON files, so the tool can sit
//! between a query front end and an execution engine during debugging.

mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use graphir_engine::ModulatorPolicy;
use std::path::PathBuf;

/// Graph traversal lowering tool.
///
/// Compiles JSON-encoded traversal step trees into operator programs and
/// decodes engine result batches.
#[derive(Parser)]
#[command(name = "graphir")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    /// Suppress info messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Output format options.
#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Modulator policy for `where(..).by(..)` steps.
#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// A single by() serves every operand
    Broadcast,
    /// Every operand needs its own by()
    Strict,
    /// by() modulators are reused cyclically
    Cycle,
}

impl From<PolicyArg> for ModulatorPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Broadcast => ModulatorPolicy::Broadcast,
            PolicyArg::Strict => ModulatorPolicy::Strict,
            PolicyArg::Cycle => ModulatorPolicy::Cycle,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Lower a traversal into an operator program
    Lower {
        /// Path to the JSON traversal
        path: PathBuf,

        /// JSON lowering configuration; flags override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Modulator policy for where() predicates
        #[arg(long)]
        policy: Option<PolicyArg>,

        /// Seed for sample() steps without one
        #[arg(long)]
        seed: Option<u64>,

        /// Lower top-level steps in parallel
        #[arg(long)]
        parallel: bool,

        /// Write the encoded program to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode an engine result batch
    Decode {
        /// Path to the JSON result batch
        path: PathBuf,

        /// JSON tag id to name table
        #[arg(long)]
        tags: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else if !cli.quiet {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    let result = match cli.command {
        Commands::Lower {
            path,
            config,
            policy,
            seed,
            parallel,
            output,
        } => commands::lower::run(
            &commands::lower::LowerArgs {
                path,
                config,
                policy: policy.map(Into::into),
                seed,
                parallel,
                output,
            },
            cli.format,
            cli.quiet,
        ),
        Commands::Decode { path, tags } => {
            commands::decode::run(&path, tags.as_deref(), cli.format, cli.quiet)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
