//! Tree→grammar conversion (§4.9, first pass): every internal node of every
//! derivation tree contributes one production alternative for its (possibly
//! renamed) non-terminal.

use grammarminer_core::{DerivationTree, Grammar, Node, Token};

use crate::method_gen::RenameTable;

/// Builds the append-only grammar from a set of mined derivation trees,
/// applying the method/loop-generalizer rename tables (§4.6, §4.7) when
/// resolving each internal node's non-terminal name.
pub fn build(trees: &[DerivationTree], renames: &RenameTable) -> Grammar {
    let mut grammar = Grammar::new(grammarminer_core::START_SYMBOL);

    // Explicit work stack rather than recursive descent (§9): each entry is
    // a `(tree_index, node)` pair still needing its production emitted.
    let mut queue: Vec<(usize, &Node)> = trees.iter().enumerate().map(|(i, t)| (i, &t.root)).collect();

    while let Some((tree_index, node)) = queue.pop() {
        if node.is_leaf() {
            continue;
        }
        let name = resolved_name(tree_index, node, renames);
        let rule: Vec<Token> = node.children.iter().map(|c| child_token(tree_index, c, renames)).collect();
        grammar.add_rule(name, rule);
        for child in &node.children {
            queue.push((tree_index, child));
        }
    }

    grammar
}

fn child_token(tree_index: usize, node: &Node, renames: &RenameTable) -> Token {
    if node.is_leaf() {
        Token::terminal(node.name.clone())
    } else {
        Token::nonterminal(resolved_name(tree_index, node, renames))
    }
}

fn resolved_name(tree_index: usize, node: &Node, renames: &RenameTable) -> String {
    renames.get(&(tree_index, node.id)).cloned().unwrap_or_else(|| node.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammarminer_core::NodeIdGen;

    fn leaf(ids: &mut NodeIdGen, ch: char, at: usize) -> Node {
        Node::leaf(ids.next(), ch, at)
    }

    #[test]
    fn builds_a_production_per_internal_node() {
        let mut ids = NodeIdGen::default();
        let a = leaf(&mut ids, 'a', 0);
        let b = leaf(&mut ids, 'b', 1);
        let inner = Node { id: ids.next(), name: "<main_0>".into(), children: vec![a, b], start: 0, end: 2 };
        let root = Node {
            id: ids.next(),
            name: grammarminer_core::START_SYMBOL.into(),
            children: vec![inner],
            start: 0,
            end: 2,
        };
        let tree = DerivationTree {
            root,
            original: "sut".into(),
            arg: "seed".into(),
            inputstr: "ab".into(),
        };

        let grammar = build(&[tree], &RenameTable::new());
        assert!(grammar.rules.contains_key("<START>"));
        assert!(grammar.rules.contains_key("<main_0>"));
        assert_eq!(grammar.rules["<main_0>"][0], vec![Token::terminal("a"), Token::terminal("b")]);
    }

    #[test]
    fn applies_the_rename_table() {
        let mut ids = NodeIdGen::default();
        let a = leaf(&mut ids, 'a', 0);
        let inner_id = ids.next();
        let inner = Node { id: inner_id, name: "<main_0>".into(), children: vec![a], start: 0, end: 1 };
        let root = Node {
            id: ids.next(),
            name: grammarminer_core::START_SYMBOL.into(),
            children: vec![inner],
            start: 0,
            end: 1,
        };
        let tree =
            DerivationTree { root, original: "sut".into(), arg: "seed".into(), inputstr: "a".into() };

        let mut renames = RenameTable::new();
        renames.insert((0, inner_id), "<main%_3>".to_string());
        let grammar = build(&[tree], &renames);
        assert!(grammar.rules.contains_key("<main%_3>"));
        assert!(!grammar.rules.contains_key("<main_0>"));
    }
}
