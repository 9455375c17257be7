//! Bounded grammar fuzzer and oracle worker client for grammarminer.
//!
//! This crate is the runtime half of the pipeline: it never constructs a
//! derivation tree or grammar itself, only consumes one (for fuzzing) or
//! drives a blocking predicate over byte strings (for the oracle).

pub mod error;
pub mod fuzzer;
pub mod oracle;

pub use error::{FuzzError, OracleError};
pub use fuzzer::{focus, LimitFuzzer};
pub use oracle::{CachingOracle, Oracle, ProcessOracle};
