//! Node registry and compatibility cache (§3), the shared bookkeeping used
//! by the active-learning core and its three callers (F, G, H).

use std::cell::Cell;
use std::collections::HashMap;

use indexmap::IndexMap;

use crate::tree::NodeId;

/// One registered occurrence of a pseudo-name: a node inside a particular
/// tree, built from a particular seed input.
///
/// `info_slot` is written exactly once, when bucketing assigns this
/// occurrence a pattern id (§4.5). It's a `Cell` rather than a plain field
/// because the registry hands out shared references to occurrences while
/// bucketing runs.
#[derive(Debug)]
pub struct Occurrence {
    pub node_id: NodeId,
    pub tree_index: usize,
    pub source_input: String,
    info_slot: Cell<Option<u32>>,
}

impl Occurrence {
    pub fn new(node_id: NodeId, tree_index: usize, source_input: impl Into<String>) -> Self {
        Occurrence {
            node_id,
            tree_index,
            source_input: source_input.into(),
            info_slot: Cell::new(None),
        }
    }

    pub fn bucket(&self) -> Option<u32> {
        self.info_slot.get()
    }

    /// Assigns this occurrence's bucket id. Panics if called twice for the
    /// same occurrence, since the registry is read-only during bucketing
    /// except for this single write (§5).
    pub fn assign_bucket(&self, bucket: u32) {
        assert!(self.info_slot.get().is_none(), "bucket already assigned");
        self.info_slot.set(Some(bucket));
    }
}

/// `Map<name, List<Occurrence>>`.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    entries: IndexMap<String, Vec<Occurrence>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, occurrence: Occurrence) {
        self.entries.entry(name.into()).or_default().push(occurrence);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn occurrences(&self, name: &str) -> &[Occurrence] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `Map<String, bool>` from a candidate input string to the oracle's
/// verdict. Process-wide (per pipeline run) and monotone: an entry is never
/// invalidated once written, matching the "first-seen wins" policy that
/// absorbs SUT non-determinism (§5).
#[derive(Debug, Default)]
pub struct CompatibilityCache {
    entries: HashMap<String, bool>,
    tested: u64,
}

impl CompatibilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached verdict for `key`, computing and memoizing it via
    /// `oracle_call` on a miss. `oracle_call` is only ever invoked once per
    /// distinct key for the lifetime of this cache.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: String,
        oracle_call: impl FnOnce() -> Result<bool, E>,
    ) -> Result<bool, E> {
        if let Some(&verdict) = self.entries.get(&key) {
            return Ok(verdict);
        }
        let verdict = oracle_call()?;
        self.entries.insert(key, verdict);
        self.tested += 1;
        Ok(verdict)
    }

    /// Number of distinct oracle calls made through this cache so far,
    /// i.e. `number_of_tested_inputs` (§5, §6).
    pub fn tested(&self) -> u64 {
        self.tested
    }
}
