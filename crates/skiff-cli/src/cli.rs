//! CLI structure and command definitions.

use anyhow::Result;
use clap::{Parser, Subcommand};
use skiff_types::Backend;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skiff")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bootstrap pipeline for disposable agent machines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render the secret-free bootstrap script for a descriptor
    Render {
        /// Descriptor YAML file
        descriptor: PathBuf,

        /// Write the script here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the full pipeline and emit the compressed boot payload
    Bundle {
        /// Descriptor YAML file
        descriptor: PathBuf,

        /// Target backend
        #[arg(short, long, default_value = "hetzner")]
        backend: Backend,

        /// Override the backend's payload ceiling in bytes
        #[arg(long)]
        ceiling: Option<usize>,

        /// Emit base64 text instead of raw gzip bytes
        #[arg(long)]
        base64: bool,

        /// Write the payload here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Derive a gateway token from a fresh keypair
    Token {
        /// Write the private key PEM here (the reproducing material)
        #[arg(long)]
        key_out: Option<PathBuf>,
    },

    /// Redact credential-shaped content from stdin to stdout
    Redact,
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        use crate::commands::*;

        match &self.command {
            Commands::Render { descriptor, output } => {
                render::execute(descriptor, output.as_deref())
            }
            Commands::Bundle {
                descriptor,
                backend,
                ceiling,
                base64,
                output,
            } => bundle::execute(descriptor, *backend, *ceiling, *base64, output.as_deref()).await,
            Commands::Token { key_out } => token::execute(key_out.as_deref()),
            Commands::Redact => redact::execute(),
        }
    }
}
