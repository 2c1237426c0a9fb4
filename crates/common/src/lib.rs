//! Shared plumbing for the workspace crates: logging setup and small wire types.

pub mod types;
pub mod utils;
