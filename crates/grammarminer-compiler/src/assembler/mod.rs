//! Grammar assembly (§4.9): turns the mined derivation trees plus the
//! method/loop rename tables into the two grammar documents described in
//! §6 — `mined_g.json` (pre-token-generalization) and `parsing_g.json`
//! (final). Each pass lives in its own file, mirroring one bullet of the
//! pipeline, and is re-run as a unit rather than fused together so each
//! stays independently testable.

mod compact;
mod enhance;
mod epsilon;
mod gc;
mod nonproductive;
mod normalize;
mod pta;
mod tree_to_grammar;

pub use compact::compact_aliases;
pub use enhance::enhance_for_parsing;
pub use epsilon::introduce_epsilon;
pub use gc::garbage_collect;
pub use nonproductive::eliminate_nonproductive;
pub use normalize::normalize_names;
pub use pta::collapse_alternatives;
pub use tree_to_grammar::build as tree_to_grammar;

use grammarminer_core::{DerivationTree, Grammar};

use crate::method_gen::RenameTable;

/// Runs tree→grammar conversion followed by every structural pass short of
/// token generalization: the result is `mined_g.json`, still containing the
/// raw method/loop pseudo-names that §4.8 rewrites token-by-token.
pub fn assemble(trees: &[DerivationTree], renames: &RenameTable) -> Grammar {
    let mut grammar = tree_to_grammar(trees, renames);
    garbage_collect(&mut grammar);
    introduce_epsilon(&mut grammar);
    eliminate_nonproductive(&mut grammar);
    garbage_collect(&mut grammar);
    collapse_alternatives(&mut grammar);
    normalize_names(&mut grammar);
    garbage_collect(&mut grammar);
    grammar
}

/// Runs the final passes over an already-token-generalized grammar,
/// producing `parsing_g.json`.
pub fn finalize(mut grammar: Grammar) -> Grammar {
    compact_aliases(&mut grammar);
    enhance_for_parsing(&mut grammar);
    garbage_collect(&mut grammar);
    grammar
}
