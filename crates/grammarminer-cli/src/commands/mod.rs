//! The four pipeline entry points named in spec.md §6 / SPEC_FULL.md §6,
//! one module each, mirroring this corpus's per-subcommand `commands/`
//! layout. Each `run` function is the entire implementation: argument
//! parsing lives in `main.rs`, mining/fuzzing/assembly logic lives in
//! `grammarminer-compiler`/`grammarminer-vm`.

pub mod compact;
pub mod dump;
pub mod fuzz;
pub mod mine;
