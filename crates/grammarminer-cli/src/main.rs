//! Thin entry point: argument parsing, config loading, logging setup, and
//! wiring the four pipeline entry points (§6, SPEC_FULL.md §6) to
//! `grammarminer-compiler`/`grammarminer-vm`. No mining logic lives here.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "grammarminer", version, about = "Infers a context-free grammar from traced SUT executions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full mining pipeline and write the six JSON documents of §6.
    Mine {
        /// Path to the TOML configuration document.
        #[arg(long)]
        config: PathBuf,
        /// Path to a JSON array of seed traces (the tracer's output).
        #[arg(long)]
        traces: PathBuf,
    },
    /// Drive the bounded fuzzer (J) standalone over an already-mined grammar.
    Fuzz {
        /// Path to a grammar document (`mined_g.json` or `parsing_g.json`).
        #[arg(long)]
        grammar: PathBuf,
        /// Number of sentences to generate.
        #[arg(long, default_value_t = 1)]
        count: usize,
        /// RNG seed; the same seed and grammar always produce the same
        /// sequence (§4.10, §4.14).
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Non-terminal to start expansion from; defaults to the grammar's
        /// own start symbol.
        #[arg(long)]
        start: Option<String>,
        /// Maximum expansion depth before falling back to minimum-cost
        /// rules (§4.10).
        #[arg(long, default_value_t = 20)]
        max_depth: usize,
    },
    /// Re-run alternative collapse (PTA, §4.9 step 5) over an
    /// already-assembled grammar.
    Compact {
        /// Path to a grammar document to compact.
        #[arg(long)]
        grammar: PathBuf,
        /// Where to write the compacted grammar; defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Pretty-print a grammar document for human inspection.
    Dump {
        /// Path to a grammar document.
        #[arg(long)]
        grammar: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Mine { config, traces } => commands::mine::run(&config, &traces),
        Command::Fuzz { grammar, count, seed, start, max_depth } => {
            commands::fuzz::run(&grammar, count, seed, start.as_deref(), max_depth)
        }
        Command::Compact { grammar, out } => commands::compact::run(&grammar, out.as_deref()),
        Command::Dump { grammar } => commands::dump::run(&grammar),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
