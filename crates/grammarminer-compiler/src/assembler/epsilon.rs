//! Epsilon introduction (§4.9 step 2): non-terminals whose pseudo-name
//! carries the epsilon/deletability marker get an empty alternative, which
//! is then propagated through every rule that references them before being
//! stripped again, leaving the grammar epsilon-free at top level (§8
//! property 5) while the nullability is still recoverable from the name.

use std::collections::HashSet;

use grammarminer_core::{ControlName, Grammar, MethodName};

fn is_epsilon_marked(name: &str) -> bool {
    if let Ok(method) = MethodName::decode(name) {
        return method.epsilon;
    }
    if let Ok(control) = ControlName::decode(name) {
        return control.can_empty;
    }
    false
}

/// Adds the empty alternative for every epsilon-marked non-terminal,
/// propagates its removal through referencing rules to a fixed point, then
/// strips the now-redundant explicit empty alternatives.
pub fn introduce_epsilon(grammar: &mut Grammar) {
    let nullable: HashSet<String> =
        grammar.rules.keys().filter(|name| is_epsilon_marked(name)).cloned().collect();
    if nullable.is_empty() {
        return;
    }

    for name in &nullable {
        let alts = grammar.rules.entry(name.clone()).or_default();
        if !alts.contains(&Vec::new()) {
            alts.push(Vec::new());
        }
    }

    loop {
        let mut changed = false;
        let names: Vec<String> = grammar.rules.keys().cloned().collect();
        for name in names {
            let alts = grammar.rules.get(&name).cloned().unwrap_or_default();
            for rule in &alts {
                for (i, tok) in rule.iter().enumerate() {
                    let Some(n) = tok.nonterminal_name() else { continue };
                    if !nullable.contains(n) {
                        continue;
                    }
                    let mut variant = rule.clone();
                    variant.remove(i);
                    if variant.is_empty() {
                        continue;
                    }
                    let current = grammar.rules.get_mut(&name).expect("name exists");
                    if !current.contains(&variant) {
                        current.push(variant);
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }

    for alts in grammar.rules.values_mut() {
        alts.retain(|rule| !rule.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammarminer_core::{ControlKind, Token};

    #[test]
    fn propagates_nullable_symbol_removal_and_strips_empty_alt() {
        let nullable_name = ControlName {
            method: "main".into(),
            ctrl: ControlKind::While,
            cid: 1,
            alt: 0,
            can_empty: true,
            stack: vec![],
        }
        .encode();

        let mut g = Grammar::new("<start>");
        g.add_rule("<start>", vec![Token::terminal("a"), Token::nonterminal(&nullable_name), Token::terminal("b")]);
        g.add_rule(&nullable_name, vec![Token::terminal("x")]);

        introduce_epsilon(&mut g);

        // the nullable symbol's own rule list has no explicit empty alt
        assert!(!g.rules[&nullable_name].contains(&Vec::new()));
        // but a variant of <start> with it removed exists
        assert!(g.rules["<start>"].contains(&vec![Token::terminal("a"), Token::terminal("b")]));
        // and the original rule (with the nullable symbol present) is kept too
        assert!(g.rules["<start>"]
            .contains(&vec![Token::terminal("a"), Token::nonterminal(&nullable_name), Token::terminal("b")]));
    }

    #[test]
    fn non_nullable_grammar_is_unchanged() {
        let mut g = Grammar::new("<start>");
        g.add_rule("<start>", vec![Token::terminal("a")]);
        let before = g.clone();
        introduce_epsilon(&mut g);
        assert_eq!(g.rules, before.rules);
    }
}
