//! Loop generalizer (Component G, §4.7): the same shape as the method
//! generalizer, but for loop and conditional pseudo-nodes. The bucket id
//! replaces the branch/iteration (`alt`) slot of the pseudo-name instead of
//! being appended to a function name.

use grammarminer_core::{ControlName, DerivationTree, NodeRegistry, Occurrence};
use grammarminer_vm::Oracle;

use crate::active_learning::{self, ActiveLearning, MAX_PROC_SAMPLES};
use crate::error::MineError;
use crate::method_gen::RenameTable;

/// The identity of one control-flow *site*: occurrences that share a method,
/// control kind, and site id are candidates for the same bucket, regardless
/// of which branch/iteration each one captured.
fn site_key(name: &ControlName) -> String {
    format!("{}:{}_{}", name.method, name.ctrl, name.cid)
}

/// Registers every loop/conditional node across `trees`, grouped by
/// control-flow site (§4.7).
pub fn register_sites(trees: &[DerivationTree]) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    for (tree_index, tree) in trees.iter().enumerate() {
        for (_, node) in tree.root.internal_nodes() {
            if let Ok(control) = ControlName::decode(&node.name) {
                let key = site_key(&control);
                registry.register(key, Occurrence::new(node.id, tree_index, tree.inputstr.clone()));
            }
        }
    }
    registry
}

/// Runs bucketing and deletability for every registered control-flow site
/// and returns the rename table to apply at grammar-assembly time.
pub fn generalize(
    trees: &[DerivationTree],
    registry: &NodeRegistry,
    rng_seed: u64,
    oracle: &mut dyn Oracle,
) -> Result<(RenameTable, u64), MineError> {
    let mut learning = ActiveLearning::new(trees);
    let mut renames = RenameTable::new();

    for site in registry.names().map(str::to_string).collect::<Vec<_>>() {
        let occurrences = registry.occurrences(&site);
        let result = active_learning::bucket(&mut learning, registry, &site, MAX_PROC_SAMPLES, rng_seed, oracle)?;

        for bucket_id in 0..result.bucket_count {
            let members: Vec<&Occurrence> = occurrences
                .iter()
                .zip(result.bucket_of.iter())
                .filter(|(_, &b)| b == bucket_id)
                .map(|(occ, _)| occ)
                .collect();
            let deletable = active_learning::bucket_is_deletable(&mut learning, &members, oracle)?;

            for occ in &members {
                let original = decode_original(trees, occ);
                let new_name = ControlName {
                    method: original.method,
                    ctrl: original.ctrl,
                    cid: original.cid,
                    alt: bucket_id,
                    can_empty: original.can_empty || deletable,
                    stack: original.stack,
                }
                .encode();
                renames.insert((occ.tree_index, occ.node_id), new_name);
            }
        }
    }

    Ok((renames, learning.tested()))
}

fn decode_original(trees: &[DerivationTree], occ: &Occurrence) -> ControlName {
    let tree = &trees[occ.tree_index];
    let path = tree.root.find_path(occ.node_id).expect("occurrence node exists");
    let node = tree.root.at_path(&path).expect("path is valid");
    ControlName::decode(&node.name).expect("registered under a control-name key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammarminer_core::{ControlKind, Node, NodeIdGen};
    use grammarminer_vm::OracleError;

    struct AcceptAll;
    impl Oracle for AcceptAll {
        fn accepts(&mut self, _bytes: &[u8]) -> Result<bool, OracleError> {
            Ok(true)
        }
    }

    fn loop_tree(ids: &mut NodeIdGen, alt: u32, body: &str) -> DerivationTree {
        let mut children = Vec::new();
        for (i, ch) in body.chars().enumerate() {
            children.push(Node::leaf(ids.next(), ch, i));
        }
        let name = ControlName {
            method: "main".into(),
            ctrl: ControlKind::While,
            cid: 4,
            alt,
            can_empty: true,
            stack: vec![],
        }
        .encode();
        let root = Node { id: ids.next(), name, start: 0, end: body.len(), children };
        DerivationTree { root, original: "sut".into(), arg: "seed".into(), inputstr: body.into() }
    }

    #[test]
    fn registers_iterations_under_a_shared_site_key() {
        let mut ids = NodeIdGen::default();
        let trees = vec![loop_tree(&mut ids, 1, "a"), loop_tree(&mut ids, 2, "a")];
        let registry = register_sites(&trees);
        assert_eq!(registry.occurrences("main:while_4").len(), 2);
    }

    #[test]
    fn compatible_iterations_collapse_to_one_bucket() {
        let mut ids = NodeIdGen::default();
        let trees = vec![loop_tree(&mut ids, 1, "a"), loop_tree(&mut ids, 2, "a")];
        let registry = register_sites(&trees);
        let mut oracle = AcceptAll;
        let (renames, _tested) = generalize(&trees, &registry, 1, &mut oracle).unwrap();
        let bucket_alts: std::collections::HashSet<u32> = renames
            .values()
            .map(|n| ControlName::decode(n).unwrap().alt)
            .collect();
        assert_eq!(bucket_alts.len(), 1);
    }
}
