//! Trace records: the per-instruction facts the tracer hands to the tree
//! builder. The tracer itself (debugger control, watchpoint-window sliding)
//! is an external collaborator; this module only models its output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One `{name, value}` argument observed at a function call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionArg {
    pub name: String,
    pub value: String,
}

/// A single instruction-level trace record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Opaque string identity of the current instruction.
    pub address: String,
    /// Symbolic function name, already sanitized (non-identifier characters
    /// mapped to `_`).
    pub function_name: String,
    /// Arguments visible at this point, used only to enrich node labels
    /// after a short lookahead within the function.
    #[serde(default)]
    pub function_args: Vec<FunctionArg>,
    /// Return addresses, outermost first. Its length is the call depth.
    pub stack: Vec<String>,
    /// Input-byte offsets read by this instruction.
    #[serde(default)]
    pub watchpoint_hits: BTreeSet<usize>,
}

impl TraceRecord {
    /// Call depth, i.e. the number of return addresses on the stack.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The innermost return address, i.e. the entry of the function this
    /// record was most recently called into (if any).
    pub fn innermost_return_address(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }
}

/// Sanitizes a raw symbol into a valid pseudo-name component: anything that
/// isn't `[A-Za-z0-9_]` becomes `_`.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// A full trace: the ordered records of one seed execution, plus the
/// metadata the tree builder's output carries alongside them (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedTrace {
    /// Path to the executable under test.
    pub original: String,
    /// Path to the seed input file.
    pub arg: String,
    /// The raw bytes of the seed input.
    pub input: Vec<u8>,
    pub records: Vec<TraceRecord>,
}

impl SeedTrace {
    pub fn input_str(&self) -> String {
        String::from_utf8_lossy(&self.input).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_non_identifier_characters() {
        assert_eq!(sanitize_identifier("foo::bar"), "foo__bar");
        assert_eq!(sanitize_identifier("main"), "main");
        assert_eq!(sanitize_identifier("op-code!"), "op_code_");
    }

    #[test]
    fn depth_is_stack_length() {
        let record = TraceRecord {
            address: "0x10".into(),
            function_name: "main".into(),
            function_args: vec![],
            stack: vec!["0x1".into(), "0x2".into()],
            watchpoint_hits: BTreeSet::new(),
        };
        assert_eq!(record.depth(), 2);
        assert_eq!(record.innermost_return_address(), Some("0x2"));
    }
}
