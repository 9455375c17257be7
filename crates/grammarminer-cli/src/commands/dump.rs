//! `grammarminer dump`: pretty-prints a grammar document for human
//! inspection — non-terminal count, rule count, start symbol, and the
//! rules themselves.

use std::path::Path;

use grammarminer_core::Grammar;

use crate::error::CliError;

pub fn run(grammar_path: &Path) -> Result<(), CliError> {
    let text = std::fs::read_to_string(grammar_path)
        .map_err(|source| CliError::Read { path: grammar_path.to_path_buf(), source })?;
    let grammar: Grammar =
        serde_json::from_str(&text).map_err(|source| CliError::Json { path: grammar_path.to_path_buf(), source })?;

    let rule_count: usize = grammar.rules.values().map(Vec::len).sum();
    println!("start: {}", grammar.start);
    println!("non-terminals: {}", grammar.rules.len());
    println!("rules: {rule_count}");
    println!();

    for (name, alternatives) in &grammar.rules {
        for rule in alternatives {
            let rhs = if rule.is_empty() {
                "ε".to_string()
            } else {
                rule.iter()
                    .map(|tok| match tok {
                        grammarminer_core::Token::NonTerminal(n) => n.clone(),
                        grammarminer_core::Token::Terminal(t) => format!("{t:?}"),
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            };
            println!("{name} ::= {rhs}");
        }
    }

    Ok(())
}
