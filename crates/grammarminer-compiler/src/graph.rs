//! Graph utilities (Component A): control-flow graph construction from
//! traces, immediate-dominator trees, natural-loop detection, and if/else
//! scope extraction.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use grammarminer_core::SeedTrace;

/// The address of one function's entry instruction, and the set of
/// addresses belonging to its body.
#[derive(Debug, Clone)]
pub struct FunctionScope {
    pub entry: String,
    pub name: String,
    pub addresses: BTreeSet<String>,
}

/// A directed multigraph over instruction addresses, built from one or more
/// traces, plus the per-function address sets used to scope dominator
/// computation and loop/conditional detection to a single function at a
/// time.
#[derive(Debug, Default)]
pub struct Cfg {
    pub successors: IndexMap<String, Vec<String>>,
    pub function_scopes: IndexMap<String, FunctionScope>,
}

impl Cfg {
    /// Builds the combined CFG and per-function scopes from a set of seed
    /// traces (§4.1). A function's address set is approximated as every
    /// address ever observed carrying that function's name; entry addresses
    /// are the targets of call edges (depth increases).
    pub fn build(traces: &[SeedTrace]) -> Cfg {
        let mut successors: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut scopes: IndexMap<String, FunctionScope> = IndexMap::new();

        for trace in traces {
            let Some(first) = trace.records.first() else { continue };
            let entry_depth = first.depth();
            scopes.entry(first.address.clone()).or_insert_with(|| FunctionScope {
                entry: first.address.clone(),
                name: first.function_name.clone(),
                addresses: BTreeSet::new(),
            });

            let mut prev = first;
            for record in trace.records.iter().skip(1) {
                if record.depth() < entry_depth {
                    break;
                }
                if record.depth() > prev.depth() {
                    add_edge(&mut successors, &prev.address, &record.address);
                    scopes.entry(record.address.clone()).or_insert_with(|| FunctionScope {
                        entry: record.address.clone(),
                        name: record.function_name.clone(),
                        addresses: BTreeSet::new(),
                    });
                } else if record.depth() == prev.depth() {
                    add_edge(&mut successors, &prev.address, &record.address);
                }
                prev = record;
            }
        }

        for trace in traces {
            for record in &trace.records {
                for scope in scopes.values_mut() {
                    if scope.name == record.function_name {
                        scope.addresses.insert(record.address.clone());
                    }
                }
            }
        }

        Cfg { successors, function_scopes: scopes }
    }

    pub fn successors_within(&self, node: &str, scope: &BTreeSet<String>) -> Vec<String> {
        self.successors
            .get(node)
            .map(|succs| {
                let mut out: Vec<String> =
                    succs.iter().filter(|a| scope.contains(a.as_str())).cloned().collect();
                out.dedup();
                out
            })
            .unwrap_or_default()
    }

    pub fn predecessors_within(&self, node: &str, scope: &BTreeSet<String>) -> Vec<String> {
        let mut out: Vec<String> = self
            .successors
            .iter()
            .filter(|(from, _)| scope.contains(from.as_str()))
            .filter(|(_, tos)| tos.iter().any(|t| t == node))
            .map(|(from, _)| from.clone())
            .collect();
        out.dedup();
        out
    }
}

fn add_edge(successors: &mut IndexMap<String, Vec<String>>, from: &str, to: &str) {
    let entry = successors.entry(from.to_string()).or_default();
    if !entry.iter().any(|a| a == to) {
        entry.push(to.to_string());
    }
}

/// Immediate-dominator map (child address -> dominator address), computed
/// with the Cooper-Harvey-Kennedy iterative algorithm (§9) over the
/// subgraph induced by `scope`, rooted at `entry`. `entry` dominates itself.
pub fn immediate_dominators(
    cfg: &Cfg,
    entry: &str,
    scope: &BTreeSet<String>,
) -> IndexMap<String, String> {
    let order = postorder(cfg, entry, scope);
    let mut idom: IndexMap<String, String> = IndexMap::new();
    if order.is_empty() {
        log::warn!(
            "graph anomaly: function entry {entry:?} has no reachable successors in its own \
             scope; skipping loop detection for this function"
        );
        return idom;
    }
    let postorder_number: IndexMap<&str, usize> =
        order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
    idom.insert(entry.to_string(), entry.to_string());

    let reverse_postorder: Vec<&String> = order.iter().rev().collect();
    let mut changed = true;
    while changed {
        changed = false;
        for &node in reverse_postorder.iter().skip(1) {
            let preds = cfg.predecessors_within(node, scope);
            let mut new_idom: Option<String> = None;
            for p in &preds {
                if idom.contains_key(p) {
                    new_idom = Some(match new_idom {
                        None => p.clone(),
                        Some(cur) => intersect(&cur, p, &postorder_number, &idom),
                    });
                }
            }
            if let Some(ni) = new_idom {
                if idom.get(node) != Some(&ni) {
                    idom.insert(node.clone(), ni);
                    changed = true;
                }
            }
        }
    }
    idom
}

fn postorder(cfg: &Cfg, entry: &str, scope: &BTreeSet<String>) -> Vec<String> {
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut order = Vec::new();
    let mut stack: Vec<(String, usize)> = vec![(entry.to_string(), 0)];
    visited.insert(entry.to_string());

    while let Some(top) = stack.last_mut() {
        let node = top.0.clone();
        let succs = cfg.successors_within(&node, scope);
        if top.1 < succs.len() {
            let next = succs[top.1].clone();
            top.1 += 1;
            if visited.insert(next.clone()) {
                stack.push((next, 0));
            }
        } else {
            stack.pop();
            order.push(node);
        }
    }
    order
}

fn intersect(
    a: &str,
    b: &str,
    postorder_number: &IndexMap<&str, usize>,
    idom: &IndexMap<String, String>,
) -> String {
    let mut finger1 = a.to_string();
    let mut finger2 = b.to_string();
    while finger1 != finger2 {
        while postorder_number.get(finger1.as_str()) < postorder_number.get(finger2.as_str()) {
            finger1 = idom.get(&finger1).unwrap().clone();
        }
        while postorder_number.get(finger2.as_str()) < postorder_number.get(finger1.as_str()) {
            finger2 = idom.get(&finger2).unwrap().clone();
        }
    }
    finger1
}

/// True if `dominator` dominates `node` (reflexive: a node dominates
/// itself).
pub fn dominates(idom: &IndexMap<String, String>, dominator: &str, node: &str) -> bool {
    let mut cur = node.to_string();
    loop {
        if cur == dominator {
            return true;
        }
        match idom.get(&cur) {
            Some(next) if next != &cur => cur = next.clone(),
            _ => return false,
        }
    }
}

/// All `(u, v)` back edges in `scope`: edges where `v` dominates `u`.
pub fn back_edges(
    cfg: &Cfg,
    scope: &BTreeSet<String>,
    idom: &IndexMap<String, String>,
) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for u in scope {
        for w in cfg.successors_within(u, scope) {
            if dominates(idom, &w, u) {
                out.push((u.clone(), w));
            }
        }
    }
    out
}

/// The natural loop of back edge `(u, header)`: `{header} ∪ {n : n can
/// reach u in G \ {header}}` (§3, §4.1).
pub fn natural_loop(cfg: &Cfg, u: &str, header: &str, scope: &BTreeSet<String>) -> BTreeSet<String> {
    if u == header {
        return BTreeSet::from([u.to_string()]);
    }
    let mut nodes: BTreeSet<String> = BTreeSet::from([header.to_string(), u.to_string()]);
    let mut stack = vec![u.to_string()];
    while let Some(n) = stack.pop() {
        for p in cfg.predecessors_within(&n, scope) {
            if p == header {
                continue;
            }
            if nodes.insert(p.clone()) {
                stack.push(p);
            }
        }
    }
    nodes
}

/// All natural loops in `scope`, grouped by header address. A header may
/// host several nested loops.
pub fn all_natural_loops(
    cfg: &Cfg,
    scope: &BTreeSet<String>,
    idom: &IndexMap<String, String>,
) -> IndexMap<String, Vec<BTreeSet<String>>> {
    let mut loops: IndexMap<String, Vec<BTreeSet<String>>> = IndexMap::new();
    for u in scope {
        for w in cfg.successors_within(u, scope) {
            if dominates(idom, &w, u) {
                let loop_nodes = natural_loop(cfg, u, &w, scope);
                loops.entry(w).or_default().push(loop_nodes);
            }
        }
    }
    loops
}

/// Resolves a tie between several candidate natural loops sharing a header,
/// by peeking ahead through the addresses the trace visits next: candidates
/// are narrowed to those containing every observed address (within the
/// union of all candidates' node sets) until exactly one remains (§4.1).
pub fn select_loop_by_lookahead<'a>(
    candidates: &[BTreeSet<String>],
    mut upcoming: impl Iterator<Item = &'a str>,
) -> Option<usize> {
    if candidates.len() == 1 {
        return Some(0);
    }
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    for addr in upcoming.by_ref() {
        if !candidates.iter().any(|c| c.contains(addr)) {
            break;
        }
        remaining.retain(|&i| candidates[i].contains(addr));
        if remaining.len() <= 1 {
            break;
        }
    }
    (remaining.len() == 1).then(|| remaining[0])
}

/// The if/else scope rooted at branch point `c`: the union of its
/// successors and all of their dominator-tree descendants, or `None` if `c`
/// doesn't have at least two successors within `scope` (§4.1).
pub fn if_else_scope(
    cfg: &Cfg,
    scope: &BTreeSet<String>,
    idom: &IndexMap<String, String>,
    c: &str,
) -> Option<BTreeSet<String>> {
    let succs = cfg.successors_within(c, scope);
    if succs.len() < 2 {
        return None;
    }
    let mut result: BTreeSet<String> = succs.iter().cloned().collect();
    for s in &succs {
        for candidate in scope {
            if dominates(idom, s, candidate) {
                result.insert(candidate.clone());
            }
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammarminer_core::TraceRecord;
    use std::collections::BTreeSet as Set;

    fn record(addr: &str, func: &str, stack: &[&str]) -> TraceRecord {
        TraceRecord {
            address: addr.to_string(),
            function_name: func.to_string(),
            function_args: vec![],
            stack: stack.iter().map(|s| s.to_string()).collect(),
            watchpoint_hits: Set::new(),
        }
    }

    fn trace(records: Vec<TraceRecord>) -> SeedTrace {
        SeedTrace { original: "sut".into(), arg: "seed".into(), input: vec![], records }
    }

    #[test]
    fn builds_straight_line_edges() {
        let t = trace(vec![
            record("a", "main", &["r0"]),
            record("b", "main", &["r0"]),
            record("c", "main", &["r0"]),
        ]);
        let cfg = Cfg::build(&[t]);
        assert_eq!(cfg.successors["a"], vec!["b".to_string()]);
        assert_eq!(cfg.successors["b"], vec!["c".to_string()]);
    }

    #[test]
    fn detects_simple_loop() {
        // a (header) -> b -> a -> b -> c
        let t = trace(vec![
            record("a", "main", &["r0"]),
            record("b", "main", &["r0"]),
            record("a", "main", &["r0"]),
            record("b", "main", &["r0"]),
            record("c", "main", &["r0"]),
        ]);
        let cfg = Cfg::build(&[t]);
        let scope: BTreeSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let idom = immediate_dominators(&cfg, "a", &scope);
        let back = back_edges(&cfg, &scope, &idom);
        assert!(back.contains(&("b".to_string(), "a".to_string())));

        let loops = all_natural_loops(&cfg, &scope, &idom);
        let headers_loops = &loops["a"];
        assert_eq!(headers_loops.len(), 1);
        assert!(headers_loops[0].contains("a"));
        assert!(headers_loops[0].contains("b"));
        assert!(!headers_loops[0].contains("c"));
    }

    #[test]
    fn if_else_scope_covers_both_branches() {
        let t = trace(vec![
            record("c", "main", &["r0"]),
            record("then", "main", &["r0"]),
            record("join", "main", &["r0"]),
        ]);
        let mut cfg = Cfg::build(&[t]);
        add_edge(&mut cfg.successors, "c", "else");
        add_edge(&mut cfg.successors, "else", "join");

        let scope: BTreeSet<String> =
            ["c", "then", "else", "join"].iter().map(|s| s.to_string()).collect();
        let idom = immediate_dominators(&cfg, "c", &scope);
        let branches = if_else_scope(&cfg, &scope, &idom, "c").unwrap();
        assert!(branches.contains("then"));
        assert!(branches.contains("else"));
    }

    #[test]
    fn lookahead_resolves_shared_header_tie() {
        let a: BTreeSet<String> = ["h", "x"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["h", "y"].iter().map(|s| s.to_string()).collect();
        let candidates = vec![a, b];
        let upcoming = vec!["x"];
        let chosen = select_loop_by_lookahead(&candidates, upcoming.into_iter());
        assert_eq!(chosen, Some(0));
    }
}
