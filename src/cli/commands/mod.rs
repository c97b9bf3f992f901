//! CLI command implementations.

pub mod serve;
pub mod signals;
pub mod strategies;
pub mod trigger;
pub mod validate;
