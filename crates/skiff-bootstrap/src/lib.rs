//! # Skiff Bootstrap
//!
//! The bootstrap composition pipeline: everything between "here is an
//! agent's configuration and its credentials" and "here are the bytes to
//! attach as machine boot data".
//!
//! The pipeline is three pure stages run in order:
//!
//! 1. [`descriptor::normalize`] — merge sparse caller input with defaults
//!    into a complete, validated [`descriptor::BootstrapDescriptor`].
//! 2. [`template::generate`] — render the descriptor into a bootstrap
//!    script containing `<secret:NAME>` placeholders instead of secret
//!    values, plus the ordered list of names it referenced.
//! 3. [`interpolate::interpolate`] — substitute every placeholder from a
//!    fully-resolved [`interpolate::SecretBindings`] map.
//! 4. [`compress::compress`] — gzip the result and enforce the backend's
//!    payload ceiling.
//!
//! [`pipeline::BootstrapPipeline`] wires the stages together, and
//! [`pipeline::SecretResolver`] joins independently-async secret producers
//! into one bindings map before interpolation starts.
//!
//! Orthogonal helpers: [`redact::redact`] scrubs credential-shaped text
//! before it reaches logs or terminals, and [`token::derive_gateway_token`]
//! mints the gateway credential from a fresh keypair's public half.

#![warn(clippy::all)]

pub mod compress;
pub mod descriptor;
pub mod interpolate;
pub mod pipeline;
pub mod redact;
pub mod template;
pub mod token;

pub use compress::{compress, decompress, CompressedPayload};
pub use descriptor::{normalize, BootstrapDescriptor, DescriptorInput, PluginInstallEntry};
pub use interpolate::{interpolate, InterpolatedScript, SecretBindings};
pub use pipeline::{BootstrapBundle, BootstrapPipeline, SecretResolver};
pub use redact::redact;
pub use template::{generate, GeneratedScript};
pub use token::{derive_gateway_token, GatewayKeypair};
