//! Method generalizer (Component F, §4.6): collapses method-call nodes with
//! the same function name into equivalence-class buckets and marks
//! deletable buckets with the epsilon marker.

use std::collections::HashMap;

use grammarminer_core::{DerivationTree, MethodName, NodeId, NodeRegistry, Occurrence};
use grammarminer_vm::Oracle;

use crate::active_learning::{self, ActiveLearning, MAX_PROC_SAMPLES};
use crate::error::MineError;

/// Final names assigned to renamed nodes, keyed by `(tree_index, node_id)`
/// rather than written in place, per §9's "mutable tree nodes... re-expressed
/// as an `info_slot` side-table" design note.
pub type RenameTable = HashMap<(usize, NodeId), String>;

/// Registers every method-call node across `trees`, grouped by the
/// enclosing function name (the pseudo-name's decoded `name` field, not the
/// full `<funcname_ID>` string, since bucketing must compare call sites of
/// the *same* function against each other).
pub fn register_methods(trees: &[DerivationTree]) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    for (tree_index, tree) in trees.iter().enumerate() {
        for (_, node) in tree.root.internal_nodes() {
            if let Ok(method) = MethodName::decode(&node.name) {
                registry.register(method.name, Occurrence::new(node.id, tree_index, tree.inputstr.clone()));
            }
        }
    }
    registry
}

/// Runs bucketing and deletability for every registered method name and
/// returns the rename table to apply at grammar-assembly time (§4.6).
pub fn generalize(
    trees: &[DerivationTree],
    registry: &NodeRegistry,
    rng_seed: u64,
    oracle: &mut dyn Oracle,
) -> Result<(RenameTable, u64), MineError> {
    let mut learning = ActiveLearning::new(trees);
    let mut renames = RenameTable::new();

    for name in registry.names().map(str::to_string).collect::<Vec<_>>() {
        let occurrences = registry.occurrences(&name);
        let result = active_learning::bucket(&mut learning, registry, &name, MAX_PROC_SAMPLES, rng_seed, oracle)?;

        for bucket_id in 0..result.bucket_count {
            let members: Vec<&Occurrence> = occurrences
                .iter()
                .zip(result.bucket_of.iter())
                .filter(|(_, &b)| b == bucket_id)
                .map(|(occ, _)| occ)
                .collect();
            let deletable = active_learning::bucket_is_deletable(&mut learning, &members, oracle)?;

            for occ in members {
                let new_name = MethodName { name: name.clone(), id: bucket_id, epsilon: deletable }.encode();
                renames.insert((occ.tree_index, occ.node_id), new_name);
            }
        }
    }

    Ok((renames, learning.tested()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammarminer_core::{Node, NodeIdGen};
    use grammarminer_vm::OracleError;

    struct AcceptAll;
    impl Oracle for AcceptAll {
        fn accepts(&mut self, _bytes: &[u8]) -> Result<bool, OracleError> {
            Ok(true)
        }
    }

    fn method_tree(ids: &mut NodeIdGen, id: u32, body: &str) -> DerivationTree {
        let mut children = Vec::new();
        for (i, ch) in body.chars().enumerate() {
            children.push(Node::leaf(ids.next(), ch, i));
        }
        let name = MethodName { name: "parse_value".into(), id, epsilon: false }.encode();
        let root = Node { id: ids.next(), name, start: 0, end: body.len(), children };
        DerivationTree { root, original: "sut".into(), arg: "seed".into(), inputstr: body.into() }
    }

    #[test]
    fn registers_occurrences_under_the_bare_function_name() {
        let mut ids = NodeIdGen::default();
        let trees = vec![method_tree(&mut ids, 0, "1"), method_tree(&mut ids, 1, "2")];
        let registry = register_methods(&trees);
        assert_eq!(registry.occurrences("parse_value").len(), 2);
    }

    #[test]
    fn identical_occurrences_land_in_one_epsilon_free_bucket() {
        let mut ids = NodeIdGen::default();
        let trees = vec![method_tree(&mut ids, 0, "1"), method_tree(&mut ids, 1, "2")];
        let registry = register_methods(&trees);
        let mut oracle = AcceptAll;
        let (renames, tested) = generalize(&trees, &registry, 1, &mut oracle).unwrap();
        assert!(tested > 0);

        let names: Vec<&String> = renames.values().collect();
        assert!(names.iter().all(|n| n.starts_with("<parse_value%_0>") || n.starts_with("<parse_value_0>")));
        // every occurrence is always-accepted, so every bucket is deletable
        assert!(names.iter().all(|n| n.contains('%')));
    }
}
