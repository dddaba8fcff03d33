//! Derive a gateway token from a fresh keypair.

use anyhow::{Context, Result};
use colored::Colorize;
use skiff_bootstrap::derive_gateway_token;
use std::path::Path;

pub fn execute(key_out: Option<&Path>) -> Result<()> {
    let keypair = derive_gateway_token()?;

    println!("{}", keypair.token);

    if let Some(path) = key_out {
        std::fs::write(path, &keypair.private_key_pem)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!(
            "{} Private key written to: {}",
            "✓".green().bold(),
            path.display()
        );
    } else {
        eprintln!(
            "{} Keypair discarded; the token cannot be re-derived without it",
            "Note:".yellow().bold()
        );
    }

    Ok(())
}
