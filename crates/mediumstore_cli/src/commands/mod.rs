//! CLI command implementations.

pub mod dump;
pub mod edit;
pub mod info;
