//! Core data structures for grammarminer: trace records, derivation trees,
//! the pseudo-name codec, the node registry, and the grammar model shared
//! by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod grammar;
pub mod pseudo_name;
pub mod registry;
pub mod trace;
pub mod tree;

pub use config::Config;
pub use grammar::{AsciiClass, Grammar, GrammarDocument, Rule, Token};
pub use pseudo_name::{ControlKind, ControlName, MethodName, PseudoName};
pub use registry::{CompatibilityCache, NodeRegistry, Occurrence};
pub use trace::{FunctionArg, SeedTrace, TraceRecord};
pub use tree::{DerivationTree, Node, NodeId, NodeIdGen, START_SYMBOL};
