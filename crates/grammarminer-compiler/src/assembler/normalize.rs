//! Name normalization (§4.9 step 6): spaces inside non-terminal names
//! become underscores, in both definitions and uses.

use indexmap::IndexMap;

use grammarminer_core::{Grammar, Token};

fn normalize(name: &str) -> String {
    name.replace(' ', "_")
}

pub fn normalize_names(grammar: &mut Grammar) {
    grammar.start = normalize(&grammar.start);

    let mut new_rules: IndexMap<String, Vec<Vec<Token>>> = IndexMap::new();
    for (name, alts) in &grammar.rules {
        let new_name = normalize(name);
        let entry = new_rules.entry(new_name).or_default();
        for rule in alts {
            let new_rule: Vec<Token> = rule
                .iter()
                .map(|tok| match tok {
                    Token::NonTerminal(n) => Token::NonTerminal(normalize(n)),
                    Token::Terminal(t) => Token::Terminal(t.clone()),
                })
                .collect();
            if !entry.contains(&new_rule) {
                entry.push(new_rule);
            }
        }
    }
    grammar.rules = new_rules;
}
