//! # Skiff Types
//!
//! Core types shared across the Skiff crates.
//!
//! Skiff provisions disposable cloud machines that boot straight into a
//! running software agent. This crate provides the building blocks the
//! bootstrap pipeline is written against:
//!
//! - Type-safe wrappers for stack and agent names, and the hostname
//!   derivation used to keep machines collision-free within a fleet
//! - The `Backend` enum carrying each cloud backend's boot-data ceiling
//! - Error types and result aliases
//!
//! ## Example
//!
//! ```
//! use skiff_types::{StackName, AgentName, Hostname};
//!
//! let stack = StackName::new("fleet-prod").unwrap();
//! let agent = AgentName::new("scout-1").unwrap();
//!
//! // Deterministic for a fixed stack/agent pair.
//! let host = Hostname::derive(&stack, &agent);
//! assert!(host.as_str().starts_with("fleet-prod-scout-1-"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod errors;
pub mod identifiers;

// Re-export common types for convenience
pub use backend::Backend;
pub use errors::{Result, SkiffError};
pub use identifiers::{AgentName, Hostname, StackName};
