//! CLI command implementations.

pub mod debug;
pub mod providers;
pub mod usage;
