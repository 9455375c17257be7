//! Alternative collapsing via prefix-tree acceptor (§4.9 step 5): for each
//! non-terminal, its rule list is treated as a sample of strings over the
//! token alphabet. Building the prefix-tree acceptor (PTA) over that sample
//! and folding states with identical right-languages (classic DFA
//! minimization) yields a smaller regular sub-grammar; the result replaces
//! the original rule set, keyed back under the parent's own name.

use indexmap::IndexMap;

use grammarminer_core::{Grammar, Rule, Token};

struct PtaNode {
    children: IndexMap<Token, usize>,
    accepting: bool,
}

/// Builds the prefix-tree acceptor over `rules`: one path per rule, sharing
/// every common prefix.
fn build_pta(rules: &[Rule]) -> Vec<PtaNode> {
    let mut nodes = vec![PtaNode { children: IndexMap::new(), accepting: false }];
    for rule in rules {
        let mut cur = 0;
        for tok in rule {
            cur = match nodes[cur].children.get(tok) {
                Some(&next) => next,
                None => {
                    nodes.push(PtaNode { children: IndexMap::new(), accepting: false });
                    let next = nodes.len() - 1;
                    nodes[cur].children.insert(tok.clone(), next);
                    next
                }
            };
        }
        nodes[cur].accepting = true;
    }
    nodes
}

/// Moore-style partition refinement: starts with two classes (accepting,
/// non-accepting) and repeatedly splits any class whose members disagree on
/// their transition signature, until the partition stops changing.
fn minimize(nodes: &[PtaNode]) -> Vec<usize> {
    let mut group: Vec<usize> = nodes.iter().map(|n| usize::from(n.accepting)).collect();
    loop {
        let mut signature_to_group: IndexMap<(usize, Vec<(String, usize)>), usize> = IndexMap::new();
        let mut new_group = vec![0usize; nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            let mut children_sig: Vec<(String, usize)> =
                node.children.iter().map(|(tok, &child)| (format!("{tok:?}"), group[child])).collect();
            children_sig.sort();
            let key = (group[i], children_sig);
            let next_id = signature_to_group.len();
            new_group[i] = *signature_to_group.entry(key).or_insert(next_id);
        }
        if new_group == group {
            return new_group;
        }
        group = new_group;
    }
}

fn helper_name(base: &str, group_id: usize) -> String {
    match base.strip_suffix('>') {
        Some(stripped) => format!("{stripped}#{group_id}>"),
        None => format!("{base}#{group_id}"),
    }
}

/// Collapses one non-terminal's rule list via its minimized PTA, writing the
/// resulting (possibly multi-non-terminal) sub-grammar into `out`.
fn collapse_one(out: &mut Grammar, base_name: &str, rules: &[Rule]) {
    let nodes = build_pta(rules);
    let group = minimize(&nodes);
    let root_group = group[0];

    let mut representative: IndexMap<usize, usize> = IndexMap::new();
    for (i, &g) in group.iter().enumerate() {
        representative.entry(g).or_insert(i);
    }

    for (&g, &node_idx) in &representative {
        let node = &nodes[node_idx];
        let is_root = g == root_group;
        if !is_root && node.children.is_empty() {
            // A pure-leaf helper state never needs its own non-terminal: its
            // referrer's rule simply ends at the token that reached it.
            continue;
        }
        let name = if is_root { base_name.to_string() } else { helper_name(base_name, g) };
        if node.accepting {
            out.add_rule(name.clone(), Vec::new());
        }
        for (tok, &child) in &node.children {
            let child_group = group[child];
            let child_node = &nodes[representative[&child_group]];
            let mut rule = vec![tok.clone()];
            if !child_node.children.is_empty() {
                let child_name =
                    if child_group == root_group { base_name.to_string() } else { helper_name(base_name, child_group) };
                rule.push(Token::nonterminal(child_name));
            }
            out.add_rule(name.clone(), rule);
        }
    }
}

/// Runs the PTA collapse over every non-terminal currently in `grammar`.
/// Helper non-terminals introduced by one collapse are never themselves
/// re-collapsed in the same pass (the snapshot of names is taken up front).
pub fn collapse_alternatives(grammar: &mut Grammar) {
    let names: Vec<String> = grammar.rules.keys().cloned().collect();
    let mut out = Grammar::new(grammar.start.clone());
    for name in names {
        let rules = grammar.rules.get(&name).cloned().unwrap_or_default();
        if rules.is_empty() {
            continue;
        }
        collapse_one(&mut out, &name, &rules);
    }
    *grammar = out;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_a_common_prefix_across_alternatives() {
        let mut g = Grammar::new("<word>");
        g.add_rule("<word>", vec![Token::terminal("c"), Token::terminal("a"), Token::terminal("t")]);
        g.add_rule("<word>", vec![Token::terminal("c"), Token::terminal("a"), Token::terminal("r")]);

        collapse_alternatives(&mut g);

        // both alternatives still derive their original strings
        let derivable = all_derivations(&g, "<word>");
        assert!(derivable.contains(&"cat".to_string()));
        assert!(derivable.contains(&"car".to_string()));
    }

    #[test]
    fn single_alternative_round_trips() {
        let mut g = Grammar::new("<lit>");
        g.add_rule("<lit>", vec![Token::terminal("x"), Token::terminal("y")]);
        collapse_alternatives(&mut g);
        let derivable = all_derivations(&g, "<lit>");
        assert_eq!(derivable, vec!["xy".to_string()]);
    }

    #[test]
    fn nullable_alternative_is_preserved() {
        let mut g = Grammar::new("<opt>");
        g.add_rule("<opt>", Vec::new());
        g.add_rule("<opt>", vec![Token::terminal("x")]);
        collapse_alternatives(&mut g);
        let derivable = all_derivations(&g, "<opt>");
        assert!(derivable.contains(&String::new()));
        assert!(derivable.contains(&"x".to_string()));
    }

    /// Exhaustively enumerates every string derivable from `start` in a
    /// small, acyclic test grammar (bounded depth guards against runaway
    /// recursion on malformed fixtures).
    fn all_derivations(grammar: &Grammar, start: &str) -> Vec<String> {
        fn go(grammar: &Grammar, name: &str, depth: usize, out: &mut Vec<String>) {
            if depth > 20 {
                return;
            }
            let Some(alts) = grammar.rules.get(name) else { return };
            for rule in alts {
                expand_rule(grammar, rule, 0, String::new(), depth, out);
            }
        }
        fn expand_rule(
            grammar: &Grammar,
            rule: &[Token],
            pos: usize,
            acc: String,
            depth: usize,
            out: &mut Vec<String>,
        ) {
            if pos == rule.len() {
                out.push(acc);
                return;
            }
            match &rule[pos] {
                Token::Terminal(t) => expand_rule(grammar, rule, pos + 1, acc + t, depth, out),
                Token::NonTerminal(n) => {
                    let mut subs = Vec::new();
                    go(grammar, n, depth + 1, &mut subs);
                    for sub in subs {
                        expand_rule(grammar, rule, pos + 1, acc.clone() + &sub, depth, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        go(grammar, start, 0, &mut out);
        out
    }
}
