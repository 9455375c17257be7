//! Wires components A-I into the full mining pipeline described by spec.md
//! §2's control-flow line: `seeds+traces -> C -> D -> F -> G -> I (partial)
//! -> H -> I (final)`.
//!
//! This module owns no algorithm of its own; it only sequences the other
//! modules and merges their rename tables. Kept separate from
//! `grammarminer-cli` so the pipeline is usable as a library (and testable
//! with a fake oracle) without a binary in the loop.

use grammarminer_core::{DerivationTree, Grammar, Node, SeedTrace};
use grammarminer_vm::Oracle;

use crate::error::MineError;
use crate::method_gen::RenameTable;
use crate::tree_builder::BuildOutput;
use crate::{assembler, graph, loop_gen, method_gen, mimid, token_gen, tree_builder};

/// Knobs that affect the mined grammar's determinism and the two loop/
/// watchpoint workarounds discussed in spec.md §9.
#[derive(Debug, Clone, Copy)]
pub struct MineOptions {
    /// RNG seed threaded through sampled-pattern bucketing (§4.5) and token
    /// generalization's carrier-tree fuzzing (§4.8).
    pub rng_seed: u64,
    /// Whether repeated visits to a loop header share one scope (the
    /// reference tool's default) or each iteration opens a fresh scope.
    pub original_mimid: bool,
    /// Attribute each watchpoint hit to the scope active at the *next* hit,
    /// a workaround for debuggers that report hits one instruction late.
    pub delay_watchpoints: bool,
}

impl Default for MineOptions {
    fn default() -> Self {
        MineOptions { rng_seed: 0, original_mimid: true, delay_watchpoints: false }
    }
}

/// Everything a caller needs to write the six JSON documents of spec.md §6.
pub struct MineOutcome {
    /// `trace.json`: the tree builder's flat per-seed output, D's input.
    pub build_outputs: Vec<BuildOutput>,
    /// `trees.json`: D's raw derivation trees, before F/G rename renames.
    pub trees: Vec<DerivationTree>,
    /// `method_trees.json`: trees with F's bucket renames applied.
    pub method_trees: Vec<DerivationTree>,
    /// `loop_trees.json`: trees with F's and G's bucket renames applied.
    pub loop_trees: Vec<DerivationTree>,
    pub mined_grammar: Grammar,
    pub parsing_grammar: Grammar,
    pub number_of_tested_inputs: u64,
}

/// Applies a rename table to a copy of `trees`, rewriting each internal
/// node's name when the table has an entry for its `(tree_index, node_id)`
/// key (§9: renames live in a side-table rather than mutating nodes
/// in-place; this is where that side-table is finally applied).
fn apply_renames(trees: &[DerivationTree], renames: &RenameTable) -> Vec<DerivationTree> {
    trees
        .iter()
        .enumerate()
        .map(|(tree_index, tree)| {
            let mut renamed = tree.clone();
            rename_node(&mut renamed.root, tree_index, renames);
            renamed
        })
        .collect()
}

fn rename_node(node: &mut Node, tree_index: usize, renames: &RenameTable) {
    if let Some(new_name) = renames.get(&(tree_index, node.id)) {
        node.name = new_name.clone();
    }
    for child in &mut node.children {
        rename_node(child, tree_index, renames);
    }
}

/// Runs the complete pipeline over a set of seed traces, issuing oracle
/// probes through `oracle` during the F, G, and H generalization passes.
///
/// Returns [`MineError::EmptyTreeSet`] if `traces` is empty: there is no
/// function scope to build a derivation tree from, and spec.md gives no
/// semantics for mining an empty corpus.
pub fn mine(
    traces: &[SeedTrace],
    options: MineOptions,
    oracle: &mut dyn Oracle,
) -> Result<MineOutcome, MineError> {
    if traces.is_empty() {
        return Err(MineError::EmptyTreeSet);
    }

    let cfg = graph::Cfg::build(traces);
    let mut tested = 0u64;

    // C: tree builder, one pass per seed trace.
    let build_outputs: Vec<BuildOutput> = traces
        .iter()
        .map(|trace| {
            let mut builder = tree_builder::TreeBuilder::new(&cfg)
                .with_original_mimid(options.original_mimid)
                .with_delay_watchpoints(options.delay_watchpoints);
            builder.build(trace)
        })
        .collect();

    // D: mimid tree miner.
    let trees: Vec<DerivationTree> = build_outputs.iter().map(mimid::mine_tree).collect();

    // F: method generalizer.
    let method_registry = method_gen::register_methods(&trees);
    let (method_renames, method_calls) =
        method_gen::generalize(&trees, &method_registry, options.rng_seed, oracle)?;
    tested += method_calls;

    // G: loop/conditional generalizer.
    let loop_registry = loop_gen::register_sites(&trees);
    let (loop_renames, loop_calls) =
        loop_gen::generalize(&trees, &loop_registry, options.rng_seed, oracle)?;
    tested += loop_calls;

    let method_trees = apply_renames(&trees, &method_renames);

    let mut renames = RenameTable::new();
    renames.extend(method_renames);
    renames.extend(loop_renames);
    let loop_trees = apply_renames(&trees, &renames);

    // I (partial): tree to grammar, plus every structural pass short of
    // token generalization. This is `mined_g.json`.
    let mut mined_grammar = assembler::assemble(&trees, &renames);

    // H: token generalizer, in place over the mined grammar.
    let token_calls = token_gen::generalize_tokens(&mut mined_grammar, options.rng_seed, oracle)?;
    tested += token_calls;

    // I (final): compaction and the parsing-grammar enhancer.
    let parsing_grammar = assembler::finalize(mined_grammar.clone());

    Ok(MineOutcome {
        build_outputs,
        trees,
        method_trees,
        loop_trees,
        mined_grammar,
        parsing_grammar,
        number_of_tested_inputs: tested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammarminer_core::TraceRecord;
    use grammarminer_vm::OracleError;
    use std::collections::BTreeSet;

    struct AcceptAll;
    impl Oracle for AcceptAll {
        fn accepts(&mut self, _bytes: &[u8]) -> Result<bool, OracleError> {
            Ok(true)
        }
    }

    fn record(address: &str, function_name: &str, stack: &[&str], hits: &[usize]) -> TraceRecord {
        TraceRecord {
            address: address.to_string(),
            function_name: function_name.to_string(),
            function_args: Vec::new(),
            stack: stack.iter().map(|s| s.to_string()).collect(),
            watchpoint_hits: hits.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn sample_trace(input: &str) -> SeedTrace {
        // A single flat function `main` that reads every byte of `input`
        // in order: one record per byte, all at call depth 0.
        let records = input
            .bytes()
            .enumerate()
            .map(|(i, _)| record(&format!("0x{i:x}"), "main", &["0xentry"], &[i]))
            .collect();
        SeedTrace { original: "sut".into(), arg: "seed".into(), input: input.as_bytes().to_vec(), records }
    }

    #[test]
    fn empty_trace_set_is_an_error() {
        let mut oracle = AcceptAll;
        let err = mine(&[], MineOptions::default(), &mut oracle).unwrap_err();
        assert!(matches!(err, MineError::EmptyTreeSet));
    }

    #[test]
    fn mines_a_grammar_that_derives_every_seed() {
        let traces = vec![sample_trace("ab"), sample_trace("cd")];
        let mut oracle = AcceptAll;
        let outcome = mine(&traces, MineOptions::default(), &mut oracle).unwrap();
        assert!(!outcome.mined_grammar.rules.is_empty());
        assert!(!outcome.parsing_grammar.rules.is_empty());
        assert!(outcome.trees.iter().map(|t| t.inputstr.clone()).eq(["ab".to_string(), "cd".to_string()]));
    }
}
