//! Subcommand implementations.

pub mod compare;
pub mod find;
pub mod hash;
pub mod sync;
