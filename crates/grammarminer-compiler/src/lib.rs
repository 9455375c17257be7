//! The grammar-mining pipeline: graph utilities (A), the pseudo-name codec
//! (re-exported from `grammarminer-core`), the tree builder (C), the mimid
//! tree miner (D), active-learning core (E), the method/loop/token
//! generalizers (F/G/H), and the grammar assembler (I), wired together by
//! [`pipeline::mine`].

pub mod active_learning;
pub mod assembler;
pub mod error;
pub mod graph;
pub mod loop_gen;
pub mod method_gen;
pub mod mimid;
pub mod pipeline;
pub mod token_gen;
pub mod tree_builder;

pub use error::MineError;
pub use pipeline::{mine, MineOutcome, MineOptions};
