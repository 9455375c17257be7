//! Errors raised by the mining pipeline's compile-time passes.

/// Errors surfaced while running the active-learning generalization passes
/// (F, G, H). Oracle failures propagate from `grammarminer-vm`; everything
/// else here is a pipeline-internal invariant violation.
#[derive(Debug, thiserror::Error)]
pub enum MineError {
    #[error("oracle unavailable during {phase} generalization: {source}")]
    Oracle {
        phase: &'static str,
        #[source]
        source: grammarminer_vm::OracleError,
    },

    #[error("pseudo-name error while {context}: {source}")]
    PseudoName {
        context: &'static str,
        #[source]
        source: grammarminer_core::error::PseudoNameError,
    },

    #[error("no tree root to assemble a grammar from")]
    EmptyTreeSet,
}
