//! Errors raised by the oracle client and bounded fuzzer.

/// Errors that can occur while querying the oracle worker process.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("failed to spawn oracle worker {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error talking to oracle worker: {0}")]
    Io(#[from] std::io::Error),

    /// The worker failed to respond (or respawn) within the configured
    /// number of restarts. The current generalization phase should abort
    /// with its partial registry intact (§7).
    #[error("oracle worker unavailable after {0} restarts")]
    WorkerUnavailable(u32),
}

/// Errors raised by the bounded fuzzer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FuzzError {
    #[error("start symbol `{0}` has no productions")]
    UnknownStart(String),

    #[error("non-terminal `{0}` has no productions and cannot be expanded")]
    DeadEnd(String),
}
