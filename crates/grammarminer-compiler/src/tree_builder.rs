//! Tree builder (Component C): walks a trace while maintaining a scope
//! stack, emitting the flat `(comparisons, method_map)` representation that
//! the tree miner (Component D) folds into a derivation tree.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use grammarminer_core::{ControlKind, ControlName, FunctionArg, MethodName, SeedTrace, TraceRecord};

use crate::graph::{self, Cfg, FunctionScope};

/// One `(input_offset, byte_char, scope_id)` comparison (§4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub offset: usize,
    pub byte: u8,
    pub scope_id: u64,
}

/// One entry of the method map: a scope's pseudo-name and its children, in
/// the order their scopes were opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRecord {
    pub id: u64,
    pub name: String,
    pub child_ids: Vec<u64>,
    /// Method-call scopes only: a human-readable rendering of the
    /// arguments found by the §4.3 step 2 lookahead, e.g. `"x=1, y=2"`.
    /// Enriches the scope's label only; deliberately kept out of `name`
    /// itself since the pseudo-name codec must still round-trip through
    /// `MethodName::decode` during bucketing (§4.5-4.7).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_label: Option<String>,
}

/// The flat output of one trace walk (§4.3); written as `trace.json`, the
/// tree miner's (D's) input (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutput {
    pub comparisons: Vec<Comparison>,
    pub method_map: IndexMap<u64, ScopeRecord>,
    pub inputstr: String,
    pub original: String,
    pub arg: String,
}

/// The root synthetic scope id, matching the source's `"0"` scope.
pub const ROOT_SCOPE_ID: u64 = 0;

struct FunctionAnalysis {
    idom: IndexMap<String, String>,
    natural_loops: IndexMap<String, Vec<BTreeSet<String>>>,
}

impl FunctionAnalysis {
    fn compute(cfg: &Cfg, scope: &FunctionScope) -> Self {
        let idom = graph::immediate_dominators(cfg, &scope.entry, &scope.addresses);
        let natural_loops = graph::all_natural_loops(cfg, &scope.addresses, &idom);
        FunctionAnalysis { idom, natural_loops }
    }
}

#[derive(Debug, Clone)]
struct Frame {
    id: u64,
    /// Entry address of the nearest enclosing function (inherited by
    /// loop/conditional frames).
    function_entry: String,
    addresses: BTreeSet<String>,
    call_depth: usize,
    conditional_stack: Vec<i32>,
    /// Set for loop frames: the loop header address, used to recognize a
    /// repeat visit as the next iteration.
    loop_header: Option<String>,
}

/// Walks traces and builds the flat comparisons/method-map representation.
///
/// `original_mimid` toggles whether repeated visits to a loop header share
/// one scope (the default, matching the reference tool) or each iteration
/// opens a fresh scope (§9). `delay_watchpoints` attributes each
/// watchpoint hit to the scope active at the *next* hit, a workaround for
/// debuggers that report watchpoints one instruction late (§9); disable it
/// for tracers that report hits promptly.
pub struct TreeBuilder<'a> {
    cfg: &'a Cfg,
    analysis_cache: HashMap<String, FunctionAnalysis>,
    next_method_id: u32,
    next_control_id: u32,
    original_mimid: bool,
    delay_watchpoints: bool,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(cfg: &'a Cfg) -> Self {
        TreeBuilder {
            cfg,
            analysis_cache: HashMap::new(),
            next_method_id: 0,
            next_control_id: 0,
            original_mimid: true,
            delay_watchpoints: false,
        }
    }

    pub fn with_original_mimid(mut self, value: bool) -> Self {
        self.original_mimid = value;
        self
    }

    pub fn with_delay_watchpoints(mut self, value: bool) -> Self {
        self.delay_watchpoints = value;
        self
    }

    fn analysis_for(&mut self, entry: &str) -> Option<&FunctionAnalysis> {
        if !self.analysis_cache.contains_key(entry) {
            let scope = self.cfg.function_scopes.get(entry)?;
            let analysis = FunctionAnalysis::compute(self.cfg, scope);
            self.analysis_cache.insert(entry.to_string(), analysis);
        }
        self.analysis_cache.get(entry)
    }

    pub fn build(&mut self, trace: &SeedTrace) -> BuildOutput {
        let mut method_map: IndexMap<u64, ScopeRecord> = IndexMap::new();
        method_map.insert(
            ROOT_SCOPE_ID,
            ScopeRecord { id: ROOT_SCOPE_ID, name: "0".to_string(), child_ids: Vec::new(), args_label: None },
        );
        let mut comparisons = Vec::new();
        let mut stack: Vec<Frame> = vec![Frame {
            id: ROOT_SCOPE_ID,
            function_entry: String::new(),
            addresses: BTreeSet::new(),
            call_depth: 0,
            conditional_stack: Vec::new(),
            loop_header: None,
        }];
        let mut pending_delay: Option<(usize, u8)> = None;

        let Some(entry_depth) = trace.records.first().map(TraceRecord::depth) else {
            return BuildOutput {
                comparisons,
                method_map,
                inputstr: trace.input_str(),
                original: trace.original.clone(),
                arg: trace.arg.clone(),
            };
        };

        for i in 0..trace.records.len() {
            let record = &trace.records[i];
            if record.depth() < entry_depth {
                break;
            }

            let depth_grew = i == 0 || record.depth() > trace.records[i - 1].depth();
            if depth_grew {
                if let Some(scope) = self.cfg.function_scopes.get(&record.address).cloned() {
                    self.push_function(&mut stack, &mut method_map, trace, i, scope);
                }
            }

            while stack.len() > 1 {
                let top = stack.last().expect("stack is non-empty");
                let still_inside =
                    top.addresses.contains(&record.address) && record.depth() >= top.call_depth;
                if still_inside {
                    break;
                }
                stack.pop();
            }

            self.maybe_open_loop(&mut stack, &mut method_map, trace, i);
            self.maybe_open_conditional(&mut stack, &mut method_map, trace, i);

            let top_id = stack.last().expect("stack is non-empty").id;
            for &offset in &record.watchpoint_hits {
                let Some(&byte) = trace.input.get(offset) else {
                    log::warn!(
                        "trace-shape violation: watchpoint hit at offset {offset} exceeds the \
                         {}-byte input; skipping this hit",
                        trace.input.len()
                    );
                    continue;
                };
                if self.delay_watchpoints {
                    if let Some((pending_offset, pending_byte)) = pending_delay.take() {
                        comparisons.push(Comparison { offset: pending_offset, byte: pending_byte, scope_id: top_id });
                    }
                    pending_delay = Some((offset, byte));
                } else {
                    comparisons.push(Comparison { offset, byte, scope_id: top_id });
                }
            }
        }

        if let Some((offset, byte)) = pending_delay.take() {
            let top_id = stack.last().expect("stack is non-empty").id;
            comparisons.push(Comparison { offset, byte, scope_id: top_id });
        }

        comparisons.sort_by_key(|c| c.offset);

        BuildOutput {
            comparisons,
            method_map,
            inputstr: trace.input_str(),
            original: trace.original.clone(),
            arg: trace.arg.clone(),
        }
    }

    fn push_function(
        &mut self,
        stack: &mut Vec<Frame>,
        method_map: &mut IndexMap<u64, ScopeRecord>,
        trace: &SeedTrace,
        index: usize,
        scope: FunctionScope,
    ) {
        let args = function_args_lookahead(&trace.records[index..], &scope.addresses);
        let args_label = (!args.is_empty()).then(|| render_args_label(&args));
        let id = self.next_method_id;
        self.next_method_id += 1;
        let name = MethodName { name: scope.name.clone(), id, epsilon: false }.encode();
        let parent_id = stack.last().expect("stack is non-empty").id;
        let conditional_stack = stack.last().expect("stack is non-empty").conditional_stack.clone();

        method_map
            .get_mut(&parent_id)
            .expect("parent scope exists")
            .child_ids
            .push(u64::from(id));
        method_map.insert(
            u64::from(id),
            ScopeRecord { id: u64::from(id), name, child_ids: Vec::new(), args_label },
        );

        stack.push(Frame {
            id: u64::from(id),
            function_entry: scope.entry.clone(),
            addresses: scope.addresses,
            call_depth: trace.records[index].depth(),
            conditional_stack,
            loop_header: None,
        });
    }

    fn maybe_open_loop(
        &mut self,
        stack: &mut Vec<Frame>,
        method_map: &mut IndexMap<u64, ScopeRecord>,
        trace: &SeedTrace,
        index: usize,
    ) {
        let record = &trace.records[index];
        let function_entry = stack.last().expect("stack is non-empty").function_entry.clone();
        if function_entry.is_empty() {
            return;
        }
        let Some(analysis) = self.analysis_for(&function_entry) else {
            log::warn!(
                "graph anomaly: no CFG scope recorded for function entry {function_entry:?}; \
                 skipping loop detection at {:?}",
                record.address
            );
            return;
        };
        let Some(candidates) = analysis.natural_loops.get(&record.address) else { return };

        if stack.last().expect("stack is non-empty").loop_header.as_deref() == Some(record.address.as_str()) {
            // Re-entering the header of the loop we're already inside: a
            // new iteration started.
            if !self.original_mimid {
                let old = stack.pop().expect("just checked top");
                self.open_new_loop_iteration(stack, method_map, trace, index, candidates, old.conditional_stack);
            }
            // original_mimid: share the existing scope across iterations.
            return;
        }

        let upcoming = trace.records[index + 1..].iter().map(|r| r.address.as_str());
        let Some(chosen) = graph::select_loop_by_lookahead(candidates, upcoming) else {
            log::warn!(
                "no suitable loop among {} candidates sharing header {:?}; continuing without \
                 opening a loop scope (§4.1 tie-break exhausted)",
                candidates.len(),
                record.address
            );
            return;
        };
        let loop_nodes = candidates[chosen].clone();
        let conditional_stack = stack.last().expect("stack is non-empty").conditional_stack.clone();
        self.open_loop_frame(stack, method_map, trace, index, loop_nodes, conditional_stack, function_entry, 1);
    }

    #[allow(clippy::too_many_arguments)]
    fn open_new_loop_iteration(
        &mut self,
        stack: &mut Vec<Frame>,
        method_map: &mut IndexMap<u64, ScopeRecord>,
        trace: &SeedTrace,
        index: usize,
        candidates: &[BTreeSet<String>],
        conditional_stack: Vec<i32>,
    ) {
        let record = &trace.records[index];
        let upcoming = trace.records[index + 1..].iter().map(|r| r.address.as_str());
        let chosen = graph::select_loop_by_lookahead(candidates, upcoming).unwrap_or(0);
        let loop_nodes = candidates[chosen].clone();
        let function_entry = stack.last().expect("stack is non-empty").function_entry.clone();
        self.open_loop_frame(stack, method_map, trace, index, loop_nodes, conditional_stack, function_entry, 1);
        let _ = record;
    }

    #[allow(clippy::too_many_arguments)]
    fn open_loop_frame(
        &mut self,
        stack: &mut Vec<Frame>,
        method_map: &mut IndexMap<u64, ScopeRecord>,
        trace: &SeedTrace,
        index: usize,
        loop_nodes: BTreeSet<String>,
        conditional_stack: Vec<i32>,
        function_entry: String,
        iteration: u32,
    ) {
        let cid = self.next_control_id;
        self.next_control_id += 1;
        let header = trace.records[index].address.clone();
        let name = ControlName {
            method: function_entry.clone(),
            ctrl: ControlKind::While,
            cid,
            alt: iteration,
            can_empty: true,
            stack: conditional_stack.clone(),
        }
        .encode();

        let parent_id = stack.last().expect("stack is non-empty").id;
        let id = u64::from(cid) | (1u64 << 32);
        method_map.get_mut(&parent_id).expect("parent scope exists").child_ids.push(id);
        method_map.insert(id, ScopeRecord { id, name, child_ids: Vec::new(), args_label: None });

        stack.push(Frame {
            id,
            function_entry,
            addresses: loop_nodes,
            call_depth: trace.records[index].depth(),
            conditional_stack,
            loop_header: Some(header),
        });
    }

    fn maybe_open_conditional(
        &mut self,
        stack: &mut Vec<Frame>,
        method_map: &mut IndexMap<u64, ScopeRecord>,
        trace: &SeedTrace,
        index: usize,
    ) {
        let record = &trace.records[index];
        let function_entry = stack.last().expect("stack is non-empty").function_entry.clone();
        if function_entry.is_empty() {
            return;
        }
        let Some(func_scope) = self.cfg.function_scopes.get(&function_entry).cloned() else {
            log::warn!(
                "graph anomaly: no CFG scope recorded for function entry {function_entry:?}; \
                 skipping conditional-scope detection at {:?}",
                record.address
            );
            return;
        };
        let direct_successors = self.cfg.successors_within(&record.address, &func_scope.addresses);
        if direct_successors.len() < 2 {
            return;
        }
        let Some(next) = trace.records.get(index + 1) else { return };
        let mut sorted_successors = direct_successors.clone();
        sorted_successors.sort();
        let Some(branch) = sorted_successors.iter().position(|a| a == &next.address) else { return };

        let Some(analysis) = self.analysis_for(&function_entry) else {
            log::warn!(
                "graph anomaly: no CFG scope recorded for function entry {function_entry:?}; \
                 skipping conditional-scope detection at {:?}",
                record.address
            );
            return;
        };
        let Some(scope_nodes) =
            graph::if_else_scope(self.cfg, &func_scope.addresses, &analysis.idom, &record.address)
        else {
            return;
        };

        let cid = self.next_control_id;
        self.next_control_id += 1;
        let mut conditional_stack = stack.last().expect("stack is non-empty").conditional_stack.clone();
        let name = ControlName {
            method: function_entry.clone(),
            ctrl: ControlKind::If,
            cid,
            alt: branch as u32,
            can_empty: false,
            stack: conditional_stack.clone(),
        }
        .encode();
        conditional_stack.push(-1);

        let parent_id = stack.last().expect("stack is non-empty").id;
        let id = u64::from(cid) | (2u64 << 32);
        method_map.get_mut(&parent_id).expect("parent scope exists").child_ids.push(id);
        method_map.insert(id, ScopeRecord { id, name, child_ids: Vec::new(), args_label: None });

        stack.push(Frame {
            id,
            function_entry,
            addresses: scope_nodes,
            call_depth: record.depth(),
            conditional_stack,
            loop_header: None,
        });
    }
}

/// Walks forward from `start` while addresses remain within `scope`,
/// keeping the last non-empty `function_args` seen (§4.3).
fn function_args_lookahead(records: &[TraceRecord], scope: &BTreeSet<String>) -> Vec<FunctionArg> {
    let mut latest = Vec::new();
    for record in records {
        if !scope.contains(&record.address) {
            break;
        }
        if !record.function_args.is_empty() {
            latest = record.function_args.clone();
        }
    }
    latest
}

/// Renders a non-empty argument list as a `"name=value, ..."` label.
fn render_args_label(args: &[FunctionArg]) -> String {
    args.iter()
        .map(|arg| format!("{}={}", arg.name, arg.value))
        .collect::<Vec<_>>()
        .join(", ")
}
