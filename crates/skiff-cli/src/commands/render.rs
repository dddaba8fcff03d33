//! Render the secret-free bootstrap script for inspection.

use anyhow::{Context, Result};
use colored::Colorize;
use skiff_bootstrap::descriptor::DescriptorInput;
use skiff_bootstrap::{generate, normalize};
use std::path::Path;

pub fn execute(descriptor: &Path, output: Option<&Path>) -> Result<()> {
    let raw = std::fs::read_to_string(descriptor)
        .with_context(|| format!("Failed to read descriptor {}", descriptor.display()))?;
    let input: DescriptorInput =
        serde_yaml::from_str(&raw).context("Failed to parse descriptor YAML")?;

    let desc = normalize(input)?;
    let script = generate(&desc)?;

    println!(
        "{} script for {} ({} secret placeholder(s))",
        "Rendered".green().bold(),
        desc.hostname.to_string().cyan(),
        script.secret_names().len()
    );

    if let Some(path) = output {
        std::fs::write(path, script.text())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} Script written to: {}", "✓".green().bold(), path.display());
    } else {
        println!("\n{}", "=".repeat(80).cyan());
        print!("{}", script.text());
        println!("{}", "=".repeat(80).cyan());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = "\
stack: fleet-test
agent: relay-1
secrets:
  api_key: api-key
  auth_key: auth-key
";

    #[test]
    fn test_render_writes_secret_free_script() {
        let dir = tempfile::tempdir().unwrap();
        let desc_path = dir.path().join("agent.yml");
        std::fs::write(&desc_path, DESCRIPTOR).unwrap();
        let out_path = dir.path().join("boot.sh");

        execute(&desc_path, Some(&out_path)).unwrap();

        let script = std::fs::read_to_string(&out_path).unwrap();
        assert!(script.contains("hostnamectl set-hostname 'fleet-test-relay-1-"));
        assert!(script.contains("API_KEY=<secret:api-key>"));
        assert!(script.contains("GATEWAY_TOKEN=<secret:gateway-token>"));
    }

    #[test]
    fn test_render_rejects_invalid_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let desc_path = dir.path().join("agent.yml");
        std::fs::write(&desc_path, "stack: fleet-test\nagent: relay-1\n").unwrap();

        // Required secret slots are missing.
        assert!(execute(&desc_path, None).is_err());
    }
}
