//! Garbage collection (§4.9 steps 1, 4, 7): drop non-terminals unreachable
//! from the start symbol. Run after every pass that can leave rules
//! dangling.

use std::collections::HashSet;

use grammarminer_core::Grammar;

/// Removes every non-terminal not reachable from `grammar.start`.
pub fn garbage_collect(grammar: &mut Grammar) {
    let mut reachable: HashSet<String> = HashSet::new();
    let mut queue = vec![grammar.start.clone()];

    while let Some(name) = queue.pop() {
        if !reachable.insert(name.clone()) {
            continue;
        }
        if let Some(alts) = grammar.rules.get(&name) {
            for rule in alts {
                for tok in rule {
                    if let Some(n) = tok.nonterminal_name() {
                        queue.push(n.to_string());
                    }
                }
            }
        }
    }

    grammar.rules.retain(|name, _| reachable.contains(name));
}
