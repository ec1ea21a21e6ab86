//! CLI command implementations.

pub mod common;
pub mod compile;
pub mod plugins;
pub mod targets;
pub mod version;
