//! `grammarminer fuzz`: drives the bounded fuzzer (J) standalone over an
//! already-mined grammar. Oracle-free; sentence generation only, the Rust
//! equivalent of the original tool's standalone `fuzz.py` entry point.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use grammarminer_core::Grammar;
use grammarminer_vm::LimitFuzzer;

use crate::error::CliError;

pub fn run(
    grammar_path: &Path,
    count: usize,
    seed: u64,
    start: Option<&str>,
    max_depth: usize,
) -> Result<(), CliError> {
    let text = std::fs::read_to_string(grammar_path)
        .map_err(|source| CliError::Read { path: grammar_path.to_path_buf(), source })?;
    let grammar: Grammar =
        serde_json::from_str(&text).map_err(|source| CliError::Json { path: grammar_path.to_path_buf(), source })?;

    let start = start.unwrap_or(&grammar.start).to_string();
    let mut rng = StdRng::seed_from_u64(seed);

    for _ in 0..count {
        // Fresh fuzzer per sentence so each draws from the same seeded
        // stream rather than a single long-lived RNG whose state would
        // make `--count` non-reproducible per-sentence.
        let sentence_seed = rng.gen::<u64>();
        let mut fuzzer = LimitFuzzer::new(&grammar, max_depth, StdRng::seed_from_u64(sentence_seed));
        let bytes = fuzzer.generate(&start)?;
        println!("{}", String::from_utf8_lossy(&bytes));
    }

    Ok(())
}
