//! CLI command implementations.

pub mod bundle;
pub mod redact;
pub mod render;
pub mod token;
