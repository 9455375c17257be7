//! Active-learning core (Component E, §4.5): the shared contract used by the
//! method, loop, and token generalizers — the replacement test, the derived
//! compatibility relation, and sampled-pattern bucketing.

use rand::seq::SliceRandom;
use rand::SeedableRng;

use grammarminer_core::{CompatibilityCache, DerivationTree, Node, NodeRegistry, Occurrence};
use grammarminer_vm::Oracle;

use crate::error::MineError;

/// Default sample size for bucketing (§4.5: "a small constant, e.g. 50").
pub const MAX_PROC_SAMPLES: usize = 50;

/// Locates an occurrence's node within its owning tree, returning the path
/// from the root (empty path = the root itself).
fn locate<'t>(trees: &'t [DerivationTree], occ: &Occurrence) -> (&'t DerivationTree, Vec<usize>) {
    let tree = &trees[occ.tree_index];
    let path = tree
        .root
        .find_path(occ.node_id)
        .expect("occurrence's node id exists in its recorded tree");
    (tree, path)
}

/// Builds the candidate byte string produced by substituting `donor`'s
/// subtree into `target`'s tree, at `target`'s position, preserving the rest
/// of `target`'s tree verbatim (§4.5).
fn substitute(trees: &[DerivationTree], target: &Occurrence, donor: &Occurrence) -> Vec<u8> {
    let (target_tree, target_path) = locate(trees, target);
    let (donor_tree, donor_path) = locate(trees, donor);
    let donor_node = donor_tree.root.at_path(&donor_path).expect("donor path is valid").clone();
    let replaced = target_tree.root.with_replacement_at(&target_path, donor_node);
    replaced.yield_string().into_bytes()
}

/// Builds the candidate produced by deleting `occ`'s subtree entirely,
/// substituting the degenerate empty node (§4.5, §9).
fn substitute_empty(trees: &[DerivationTree], occ: &Occurrence) -> Vec<u8> {
    let (tree, path) = locate(trees, occ);
    let at_offset = tree.root.at_path(&path).map(|n| n.start).unwrap_or(0);
    let empty = Node::empty(occ.node_id, at_offset);
    let replaced = tree.root.with_replacement_at(&path, empty);
    replaced.yield_string().into_bytes()
}

/// Shared state threaded through one generalization phase: the compatibility
/// cache (§3) and a running count of oracle calls made so far.
pub struct ActiveLearning<'t> {
    trees: &'t [DerivationTree],
    cache: CompatibilityCache,
}

impl<'t> ActiveLearning<'t> {
    pub fn new(trees: &'t [DerivationTree]) -> Self {
        ActiveLearning { trees, cache: CompatibilityCache::new() }
    }

    /// `number_of_tested_inputs` for this phase (§5, §6).
    pub fn tested(&self) -> u64 {
        self.cache.tested()
    }

    /// One directed replacement test: does the SUT still accept `target`'s
    /// tree with `donor`'s subtree substituted in?
    fn replacement_holds(
        &mut self,
        target: &Occurrence,
        donor: &Occurrence,
        oracle: &mut dyn Oracle,
    ) -> Result<bool, MineError> {
        let candidate = substitute(self.trees, target, donor);
        let key = format!("{candidate:?}");
        self.cache
            .get_or_try_insert_with(key, || oracle.accepts(&candidate))
            .map_err(|source| MineError::Oracle { phase: "compatibility", source })
    }

    /// `A ≈ B` iff both directed replacements hold (§4.5).
    pub fn compatible(
        &mut self,
        a: &Occurrence,
        b: &Occurrence,
        oracle: &mut dyn Oracle,
    ) -> Result<bool, MineError> {
        Ok(self.replacement_holds(a, b, oracle)? && self.replacement_holds(b, a, oracle)?)
    }

    /// Whether deleting `occ`'s subtree (substituting the empty node) keeps
    /// the input accepted.
    pub fn deletable_alone(&mut self, occ: &Occurrence, oracle: &mut dyn Oracle) -> Result<bool, MineError> {
        let candidate = substitute_empty(self.trees, occ);
        let key = format!("{candidate:?}");
        self.cache
            .get_or_try_insert_with(key, || oracle.accepts(&candidate))
            .map_err(|source| MineError::Oracle { phase: "deletability", source })
    }
}

/// Draws a reproducible sample of up to `max` indices from `0..len`, ordered
/// by a deterministic shuffle keyed on `seed` (§4.5).
pub fn sample_indices(len: usize, max: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    indices.truncate(max.min(len));
    indices
}

/// The bitwise compatibility pattern of one occurrence against the sample,
/// and the dense bucket id occurrences with an identical pattern share.
pub struct BucketingResult {
    /// One bucket id per occurrence, in the same order as
    /// `registry.occurrences(name)`.
    pub bucket_of: Vec<u32>,
    /// Number of distinct buckets produced.
    pub bucket_count: u32,
}

/// Runs §4.5's bucketing for all occurrences of `name`: draws a sample of up
/// to `MAX_PROC_SAMPLES` occurrences, computes each occurrence's
/// compatibility pattern against the sample, and assigns dense bucket ids in
/// first-seen order.
pub fn bucket(
    learning: &mut ActiveLearning<'_>,
    registry: &NodeRegistry,
    name: &str,
    sample_size: usize,
    rng_seed: u64,
    oracle: &mut dyn Oracle,
) -> Result<BucketingResult, MineError> {
    let occurrences = registry.occurrences(name);
    let sample_idx = sample_indices(occurrences.len(), sample_size, rng_seed);
    let sample: Vec<&Occurrence> = sample_idx.iter().map(|&i| &occurrences[i]).collect();

    let mut patterns: Vec<Vec<bool>> = Vec::with_capacity(occurrences.len());
    for occ in occurrences {
        let mut pattern = Vec::with_capacity(sample.len());
        for &probe in &sample {
            pattern.push(learning.compatible(occ, probe, oracle)?);
        }
        patterns.push(pattern);
    }

    let mut seen: Vec<Vec<bool>> = Vec::new();
    let mut bucket_of = Vec::with_capacity(patterns.len());
    for pattern in &patterns {
        let id = match seen.iter().position(|p| p == pattern) {
            Some(id) => id,
            None => {
                seen.push(pattern.clone());
                seen.len() - 1
            }
        };
        bucket_of.push(id as u32);
    }

    Ok(BucketingResult { bucket_of, bucket_count: seen.len() as u32 })
}

/// Whether every occurrence in a bucket remains accepted when its subtree is
/// deleted — the bucket (not merely one occurrence) is deletable only if
/// this holds for all of its members (§4.5).
pub fn bucket_is_deletable(
    learning: &mut ActiveLearning<'_>,
    occurrences: &[&Occurrence],
    oracle: &mut dyn Oracle,
) -> Result<bool, MineError> {
    for occ in occurrences {
        if !learning.deletable_alone(occ, oracle)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammarminer_core::{NodeId, NodeIdGen};
    use grammarminer_vm::OracleError;

    struct AcceptAll;
    impl Oracle for AcceptAll {
        fn accepts(&mut self, _bytes: &[u8]) -> Result<bool, OracleError> {
            Ok(true)
        }
    }

    struct AcceptsOnlyBalanced;
    impl Oracle for AcceptsOnlyBalanced {
        fn accepts(&mut self, bytes: &[u8]) -> Result<bool, OracleError> {
            let mut depth = 0i32;
            for &b in bytes {
                match b {
                    b'(' => depth += 1,
                    b')' => depth -= 1,
                    _ => {}
                }
                if depth < 0 {
                    return Ok(false);
                }
            }
            Ok(depth == 0)
        }
    }

    fn leaf_tree(ids: &mut NodeIdGen, s: &str) -> DerivationTree {
        let mut children = Vec::new();
        for (i, ch) in s.chars().enumerate() {
            children.push(Node::leaf(ids.next(), ch, i));
        }
        let root = Node { id: ids.next(), name: "<pair>".into(), start: 0, end: s.len(), children };
        DerivationTree { root, original: "sut".into(), arg: "seed".into(), inputstr: s.into() }
    }

    #[test]
    fn compatible_nodes_both_directions_accepted() {
        let mut ids = NodeIdGen::default();
        let a = leaf_tree(&mut ids, "()");
        let b = leaf_tree(&mut ids, "()");
        let trees = vec![a, b];

        let occ_a = Occurrence::new(trees[0].root.id, 0, "()");
        let occ_b = Occurrence::new(trees[1].root.id, 1, "()");

        let mut learning = ActiveLearning::new(&trees);
        let mut oracle = AcceptAll;
        assert!(learning.compatible(&occ_a, &occ_b, &mut oracle).unwrap());
        assert_eq!(learning.tested(), 1);
    }

    #[test]
    fn incompatible_nodes_break_balance() {
        let mut ids = NodeIdGen::default();
        // tree A: "(a)" with root id pointing at the whole pair
        let a_inner = Node::leaf(ids.next(), 'a', 1);
        let a_root = Node {
            id: ids.next(),
            name: "<pair>".into(),
            start: 0,
            end: 3,
            children: vec![Node::leaf(NodeId(900), '(', 0), a_inner, Node::leaf(NodeId(901), ')', 2)],
        };
        let tree_a = DerivationTree {
            root: a_root,
            original: "sut".into(),
            arg: "seed".into(),
            inputstr: "(a)".into(),
        };

        // tree B: a lone unmatched "("
        let b_leaf = Node::leaf(ids.next(), '(', 0);
        let tree_b = DerivationTree {
            root: b_leaf.clone(),
            original: "sut".into(),
            arg: "seed".into(),
            inputstr: "(".into(),
        };

        let occ_a = Occurrence::new(tree_a.root.children[1].id, 0, "(a)");
        let occ_b = Occurrence::new(tree_b.root.id, 1, "(");

        let trees = vec![tree_a, tree_b];
        let mut learning = ActiveLearning::new(&trees);
        let mut oracle = AcceptsOnlyBalanced;
        // replacing the 'a' in "(a)" with "(" gives "((" which is unbalanced
        assert!(!learning.compatible(&occ_a, &occ_b, &mut oracle).unwrap());
    }

    #[test]
    fn sample_indices_are_reproducible_for_a_fixed_seed() {
        let a = sample_indices(10, 5, 7);
        let b = sample_indices(10, 5, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn bucketing_groups_identical_patterns_together() {
        let mut ids = NodeIdGen::default();
        let t0 = leaf_tree(&mut ids, "()");
        let t1 = leaf_tree(&mut ids, "()");
        let t2 = leaf_tree(&mut ids, "()");
        let trees = vec![t0, t1, t2];

        let mut registry = NodeRegistry::new();
        registry.register("<k>", Occurrence::new(trees[0].root.id, 0, "()"));
        registry.register("<k>", Occurrence::new(trees[1].root.id, 1, "()"));
        registry.register("<k>", Occurrence::new(trees[2].root.id, 2, "()"));

        let mut learning = ActiveLearning::new(&trees);
        let mut oracle = AcceptAll;
        let result = bucket(&mut learning, &registry, "<k>", MAX_PROC_SAMPLES, 1, &mut oracle).unwrap();
        assert_eq!(result.bucket_count, 1);
        assert_eq!(result.bucket_of, vec![0, 0, 0]);
    }
}
