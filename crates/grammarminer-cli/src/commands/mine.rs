//! `grammarminer mine`: loads configuration and a trace file, runs the full
//! pipeline, and writes the six JSON documents named in §6 into the
//! configured output directory.

use std::path::Path;
use std::time::Duration;

use grammarminer_compiler::pipeline::{self, MineOptions};
use grammarminer_core::{Config, GrammarDocument, SeedTrace};
use grammarminer_vm::{CachingOracle, ProcessOracle};

use crate::error::CliError;

fn init_logging(level: &str) {
    let level = level.parse().unwrap_or(log::LevelFilter::Info);
    let _ = simple_logger::SimpleLogger::new().with_level(level).init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text =
        std::fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_path_buf(), source })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json { path: path.to_path_buf(), source })
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|source| CliError::Json { path: path.to_path_buf(), source })?;
    std::fs::write(path, text).map_err(|source| CliError::Write { path: path.to_path_buf(), source })
}

pub fn run(config_path: &Path, traces_path: &Path) -> Result<(), CliError> {
    let config = Config::load(config_path)?;
    init_logging(&config.logs.log_level);

    log::info!("loading traces from {}", traces_path.display());
    let traces: Vec<SeedTrace> = read_json(traces_path)?;
    if traces.is_empty() {
        return Err(CliError::NoSeeds(traces_path.to_path_buf()));
    }

    std::fs::create_dir_all(&config.basic.output_directory)
        .map_err(|source| CliError::CreateDir { path: config.basic.output_directory.clone(), source })?;

    let inner = ProcessOracle::new(
        config.basic.binary_file.clone(),
        Duration::from_millis(config.oracle.timeout_ms),
        config.oracle.max_restarts,
    );
    let mut oracle = CachingOracle::new(inner);

    log::info!("mining grammar from {} seed traces", traces.len());
    let outcome = pipeline::mine(&traces, MineOptions::default(), &mut oracle)?;
    log::info!("mining complete: {} oracle calls tested", outcome.number_of_tested_inputs);

    let out = &config.basic.output_directory;
    write_json(&out.join("trace.json"), &outcome.build_outputs)?;
    write_json(&out.join("trees.json"), &outcome.trees)?;
    write_json(&out.join("method_trees.json"), &outcome.method_trees)?;
    write_json(&out.join("loop_trees.json"), &outcome.loop_trees)?;
    write_json(&out.join("mined_g.json"), &outcome.mined_grammar)?;

    let command = format!("grammarminer mine --config {} --traces {}", config_path.display(), traces_path.display());
    let document =
        GrammarDocument::from_grammar(&outcome.parsing_grammar, command, outcome.number_of_tested_inputs);
    write_json(&out.join("parsing_g.json"), &document)?;

    log::info!("wrote grammar documents to {}", out.display());
    Ok(())
}
