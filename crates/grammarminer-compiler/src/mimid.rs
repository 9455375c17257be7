//! Mimid tree miner (Component D, §4.4): folds the flat
//! `(comparisons, method_map)` representation the tree builder produces into
//! the rose-tree derivation tree described in §3.

use indexmap::IndexMap;

use grammarminer_core::{DerivationTree, Node, NodeIdGen, START_SYMBOL};

use crate::tree_builder::{BuildOutput, ScopeRecord, ROOT_SCOPE_ID};

/// Converts one trace's flat build output into a derivation tree. Each scope
/// becomes an internal node whose children are, in input order, recursive
/// subtrees of child scopes interleaved with literal leaves for comparisons
/// owned directly by that scope; ties at the same offset resolve by nesting
/// depth (a child scope's comparisons are deeper than the parent's own).
pub fn mine_tree(output: &BuildOutput) -> DerivationTree {
    let mut ids = NodeIdGen::default();
    let input: Vec<u8> = output.inputstr.bytes().collect();

    let outer = build_node(ROOT_SCOPE_ID, &output.method_map, &output.comparisons, &input, &mut ids);
    let root = Node {
        id: ids.next(),
        name: START_SYMBOL.to_string(),
        start: outer.start,
        end: outer.end,
        children: vec![outer],
    };

    DerivationTree {
        root,
        original: output.original.clone(),
        arg: output.arg.clone(),
        inputstr: output.inputstr.clone(),
    }
}

/// One child of a scope being assembled: either a nested scope's finished
/// node, or a single-character leaf, tagged with the input offset it starts
/// at (and, for ties, the nesting depth it was produced at) so children can
/// be sorted into input order before being attached.
struct PendingChild {
    offset: usize,
    depth: usize,
    node: Node,
}

fn build_node(
    scope_id: u64,
    method_map: &IndexMap<u64, ScopeRecord>,
    comparisons: &[crate::tree_builder::Comparison],
    input: &[u8],
    ids: &mut NodeIdGen,
) -> Node {
    build_node_at_depth(scope_id, method_map, comparisons, input, ids, 0)
}

fn build_node_at_depth(
    scope_id: u64,
    method_map: &IndexMap<u64, ScopeRecord>,
    comparisons: &[crate::tree_builder::Comparison],
    input: &[u8],
    ids: &mut NodeIdGen,
    depth: usize,
) -> Node {
    let record = method_map.get(&scope_id).expect("scope exists in method map");
    let mut pending: Vec<PendingChild> = Vec::new();

    for &child_id in &record.child_ids {
        let child = build_node_at_depth(child_id, method_map, comparisons, input, ids, depth + 1);
        pending.push(PendingChild { offset: child.start, depth: depth + 1, node: child });
    }

    for cmp in comparisons.iter().filter(|c| c.scope_id == scope_id) {
        let ch = *input.get(cmp.offset).unwrap_or(&cmp.byte) as char;
        let leaf = Node::leaf(ids.next(), ch, cmp.offset);
        pending.push(PendingChild { offset: cmp.offset, depth, node: leaf });
    }

    // Input order, ties broken by nesting depth: a comparison owned directly
    // by this scope at the same offset as a child scope's first byte would
    // be a contradiction in well-formed input, but in the ambiguous case we
    // still need a total order, and the deeper node wins (§4.4).
    pending.sort_by(|a, b| a.offset.cmp(&b.offset).then(b.depth.cmp(&a.depth)));

    let children: Vec<Node> = pending.into_iter().map(|p| p.node).collect();
    let start = children.first().map_or(0, |c| c.start);
    let end = children.last().map_or(start, |c| c.end);

    Node { id: ids.next(), name: record.name.clone(), children, start, end }
}

/// Counts leaves in a subtree; tests use this to sanity-check that mining
/// didn't drop any input bytes.
pub fn leaf_count(node: &Node) -> usize {
    if node.is_leaf() {
        return 1;
    }
    node.children.iter().map(leaf_count).sum()
}
