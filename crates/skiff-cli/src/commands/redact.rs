//! Redact credential-shaped content from stdin to stdout.

use anyhow::Result;
use std::io::Read as _;

pub fn execute() -> Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    print!("{}", skiff_bootstrap::redact(&input));
    Ok(())
}
