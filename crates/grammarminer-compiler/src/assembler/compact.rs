//! Compaction (§4.9 step 9): inline non-terminals whose sole alternative is
//! a single other non-terminal. Runs after token generalization, just
//! before the parsing enhancer.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use grammarminer_core::{Grammar, Token};

/// Replaces every `X` whose only rule is `X ::= Y` with `Y` everywhere `X`
/// is used (including as the start symbol), following alias chains, and
/// drops the now-unused alias definitions.
pub fn compact_aliases(grammar: &mut Grammar) {
    let mut alias: HashMap<String, String> = HashMap::new();
    for (name, alts) in &grammar.rules {
        if let [rule] = alts.as_slice() {
            if let [Token::NonTerminal(target)] = rule.as_slice() {
                if target != name {
                    alias.insert(name.clone(), target.clone());
                }
            }
        }
    }
    if alias.is_empty() {
        return;
    }

    let resolved: HashMap<String, String> =
        alias.keys().map(|name| (name.clone(), resolve(name, &alias))).collect();

    grammar.start = resolved.get(&grammar.start).cloned().unwrap_or_else(|| grammar.start.clone());

    let mut new_rules: IndexMap<String, Vec<Vec<Token>>> = IndexMap::new();
    for (name, alts) in &grammar.rules {
        if resolved.contains_key(name) {
            continue;
        }
        let entry = new_rules.entry(name.clone()).or_default();
        for rule in alts {
            let new_rule: Vec<Token> = rule
                .iter()
                .map(|tok| match tok {
                    Token::NonTerminal(n) => {
                        Token::NonTerminal(resolved.get(n).cloned().unwrap_or_else(|| n.clone()))
                    }
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

/// Follows an alias chain to its final target, guarding against cycles
/// (an alias that only ever points back into its own chain is left as the
/// last name visited rather than looping forever).
fn resolve(name: &str, alias: &HashMap<String, String>) -> String {
    let mut current = name.to_string();
    let mut seen: HashSet<String> = HashSet::new();
    while let Some(next) = alias.get(&current) {
        if !seen.insert(current.clone()) {
            break;
        }
        current = next.clone();
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inlines_a_single_nonterminal_alias() {
        let mut g = Grammar::new("<start>");
        g.add_rule("<start>", vec![Token::nonterminal("wrapper")]);
        g.add_rule("<wrapper>", vec![Token::nonterminal("real")]);
        g.add_rule("<real>", vec![Token::terminal("x")]);

        compact_aliases(&mut g);

        assert_eq!(g.start, "<real>");
        assert!(!g.rules.contains_key("<wrapper>"));
        assert_eq!(g.rules["<real>"], vec![vec![Token::terminal("x")]]);
    }

    #[test]
    fn follows_chains_of_aliases() {
        let mut g = Grammar::new("<a>");
        g.add_rule("<a>", vec![Token::nonterminal("b")]);
        g.add_rule("<b>", vec![Token::nonterminal("c")]);
        g.add_rule("<c>", vec![Token::terminal("x"), Token::terminal("y")]);

        compact_aliases(&mut g);

        assert_eq!(g.start, "<c>");
        assert!(!g.rules.contains_key("<a>"));
        assert!(!g.rules.contains_key("<b>"));
    }

    #[test]
    fn leaves_non_alias_nonterminals_untouched() {
        let mut g = Grammar::new("<start>");
        g.add_rule("<start>", vec![Token::terminal("a"), Token::terminal("b")]);
        let before = g.clone();
        compact_aliases(&mut g);
        assert_eq!(g.rules, before.rules);
    }
}
