//! The CLI's own error type: wraps every library error the four
//! subcommands can surface, plus the I/O failures of reading/writing the
//! JSON documents named in spec.md §6. No silent fallback (spec.md §7):
//! every variant here reaches `main` and is printed before a non-zero exit.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read configuration: {0}")]
    Config(#[from] grammarminer_core::error::ConfigError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("seed directory {0} contains no seed files")]
    NoSeeds(PathBuf),

    #[error(transparent)]
    Mine(#[from] grammarminer_compiler::MineError),

    #[error(transparent)]
    Oracle(#[from] grammarminer_vm::OracleError),

    #[error(transparent)]
    Fuzz(#[from] grammarminer_vm::FuzzError),
}
