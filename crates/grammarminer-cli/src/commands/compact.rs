//! `grammarminer compact`: re-runs the PTA alternative-collapse pass
//! (§4.9 step 5) over an already-assembled grammar, the Rust equivalent of
//! the original tool's standalone `grammar-compact.py`.

use std::path::Path;

use grammarminer_compiler::assembler;
use grammarminer_core::Grammar;

use crate::error::CliError;

pub fn run(grammar_path: &Path, out: Option<&Path>) -> Result<(), CliError> {
    let text = std::fs::read_to_string(grammar_path)
        .map_err(|source| CliError::Read { path: grammar_path.to_path_buf(), source })?;
    let mut grammar: Grammar =
        serde_json::from_str(&text).map_err(|source| CliError::Json { path: grammar_path.to_path_buf(), source })?;

    assembler::collapse_alternatives(&mut grammar);
    assembler::garbage_collect(&mut grammar);

    let text = serde_json::to_string_pretty(&grammar)
        .map_err(|source| CliError::Json { path: grammar_path.to_path_buf(), source })?;

    match out {
        Some(path) => std::fs::write(path, text).map_err(|source| CliError::Write { path: path.to_path_buf(), source }),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammarminer_core::Token;

    #[test]
    fn compacts_and_writes_to_the_requested_path() {
        let mut grammar = Grammar::new("<start>");
        grammar.add_rule("<start>", vec![Token::nonterminal("a"), Token::terminal("x")]);
        grammar.add_rule("<a>", vec![Token::terminal("y")]);
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mined.json");
        let output = dir.path().join("compacted.json");
        std::fs::write(&input, serde_json::to_string(&grammar).unwrap()).unwrap();

        run(&input, Some(&output)).unwrap();

        let result: Grammar = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(result.start, "<start>");
    }
}
