//! Non-productive elimination (§4.9 step 3): keep only rules all of whose
//! non-terminals eventually derive some terminal string, computed as a
//! fixed point seeded with all-terminal rules.

use std::collections::HashSet;

use grammarminer_core::Grammar;

fn rule_is_productive(rule: &[grammarminer_core::Token], productive: &HashSet<String>) -> bool {
    rule.iter().all(|tok| match tok.nonterminal_name() {
        Some(n) => productive.contains(n),
        None => true,
    })
}

/// Drops every rule alternative that can never bottom out in a terminal
/// string, and every non-terminal left with no alternatives at all.
pub fn eliminate_nonproductive(grammar: &mut Grammar) {
    let mut productive: HashSet<String> = HashSet::new();
    loop {
        let mut changed = false;
        for (name, alts) in &grammar.rules {
            if productive.contains(name) {
                continue;
            }
            if alts.iter().any(|rule| rule_is_productive(rule, &productive)) {
                productive.insert(name.clone());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for (name, alts) in grammar.rules.iter_mut() {
        if !productive.contains(name) {
            alts.clear();
            continue;
        }
        alts.retain(|rule| rule_is_productive(rule, &productive));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammarminer_core::Token;

    #[test]
    fn drops_rules_that_depend_on_an_unproductive_cycle() {
        let mut g = Grammar::new("<start>");
        g.add_rule("<start>", vec![Token::nonterminal("a")]);
        g.add_rule("<start>", vec![Token::terminal("ok")]);
        // <a> only ever refers to itself: never bottoms out
        g.add_rule("<a>", vec![Token::nonterminal("a")]);

        eliminate_nonproductive(&mut g);

        assert!(g.rules["<a>"].is_empty());
        assert_eq!(g.rules["<start>"], vec![vec![Token::terminal("ok")]]);
    }

    #[test]
    fn keeps_mutually_recursive_but_eventually_terminal_rules() {
        let mut g = Grammar::new("<start>");
        g.add_rule("<start>", vec![Token::nonterminal("a")]);
        g.add_rule("<a>", vec![Token::nonterminal("b")]);
        g.add_rule("<b>", vec![Token::terminal("x")]);

        eliminate_nonproductive(&mut g);

        assert_eq!(g.rules["<start>"], vec![vec![Token::nonterminal("a")]]);
        assert_eq!(g.rules["<a>"], vec![vec![Token::nonterminal("b")]]);
    }
}
