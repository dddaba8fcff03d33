//! Run the full pipeline and emit the compressed boot payload.
//!
//! Secret values are pulled from `SKIFF_SECRET_*` environment variables,
//! one per slot the rendered script references. The gateway token slot is
//! derived from a fresh keypair when no variable overrides it.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use skiff_bootstrap::descriptor::DescriptorInput;
use skiff_bootstrap::template::PLUGIN_SECRET_PREFIX;
use skiff_bootstrap::{
    compress, derive_gateway_token, generate, interpolate, normalize, SecretResolver,
};
use skiff_types::Backend;
use std::io::Write as _;
use std::path::Path;

/// Environment variable carrying the value for a secret name.
///
/// `api-key` → `SKIFF_SECRET_API_KEY`, `plugin:BROWSER_TOKEN` →
/// `SKIFF_SECRET_BROWSER_TOKEN`.
fn slot_env_var(name: &str) -> String {
    let bare = name.strip_prefix(PLUGIN_SECRET_PREFIX).unwrap_or(name);
    format!("SKIFF_SECRET_{}", bare.replace('-', "_").to_uppercase())
}

async fn from_env(var: String) -> skiff_types::Result<String> {
    std::env::var(&var).map_err(|_| {
        skiff_types::SkiffError::Other(format!("Environment variable {} is not set", var))
    })
}

pub async fn execute(
    descriptor: &Path,
    backend: Backend,
    ceiling: Option<usize>,
    base64: bool,
    output: Option<&Path>,
) -> Result<()> {
    let raw = std::fs::read_to_string(descriptor)
        .with_context(|| format!("Failed to read descriptor {}", descriptor.display()))?;
    let input: DescriptorInput =
        serde_yaml::from_str(&raw).context("Failed to parse descriptor YAML")?;

    let desc = normalize(input)?;
    let script = generate(&desc)?;

    println!(
        "{} payload for {} on {}",
        "Bundling".green().bold(),
        desc.hostname.to_string().cyan(),
        backend.to_string().cyan()
    );

    let gateway_slot = desc.secrets.gateway_token.clone();
    let mut resolver = SecretResolver::new();
    for name in script.secret_names() {
        let var = slot_env_var(name);
        if let Some(env) = name.strip_prefix(PLUGIN_SECRET_PREFIX) {
            resolver = resolver.plugin(env, from_env(var));
        } else if *name == gateway_slot && std::env::var(&var).is_err() {
            resolver = resolver.slot(name.clone(), async {
                let keypair = tokio::task::spawn_blocking(derive_gateway_token)
                    .await
                    .map_err(|e| skiff_types::SkiffError::Token(e.to_string()))??;
                Ok(keypair.token)
            });
        } else {
            resolver = resolver.slot(name.clone(), from_env(var));
        }
    }
    let bindings = resolver.resolve().await?;

    let interpolated = interpolate(&script, &bindings)?;
    for name in &interpolated.unused {
        eprintln!("{} unused binding: {}", "Warning:".yellow().bold(), name);
    }

    let ceiling = ceiling.unwrap_or_else(|| backend.payload_ceiling());
    let payload = compress(&interpolated.script, ceiling)?;

    println!(
        "{} {} bytes compressed (ceiling {})",
        "✓".green().bold(),
        payload.len(),
        ceiling
    );

    match (output, base64) {
        (Some(path), true) => {
            std::fs::write(path, payload.to_base64())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} Payload written to: {}", "✓".green().bold(), path.display());
        }
        (Some(path), false) => {
            std::fs::write(path, payload.as_bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} Payload written to: {}", "✓".green().bold(), path.display());
        }
        (None, true) => println!("{}", payload.to_base64()),
        (None, false) => {
            if atty_stdout() {
                bail!("Refusing to write raw gzip bytes to a terminal; pass --base64 or --output");
            }
            std::io::stdout().write_all(payload.as_bytes())?;
        }
    }

    Ok(())
}

fn atty_stdout() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_env_var_naming() {
        assert_eq!(slot_env_var("api-key"), "SKIFF_SECRET_API_KEY");
        assert_eq!(slot_env_var("gateway-token"), "SKIFF_SECRET_GATEWAY_TOKEN");
        assert_eq!(
            slot_env_var("plugin:BROWSER_TOKEN"),
            "SKIFF_SECRET_BROWSER_TOKEN"
        );
    }

    // Slot names are unique to this test so its env vars cannot collide
    // with other tests running in the same process.
    const DESCRIPTOR: &str = "\
stack: fleet-test
agent: relay-2
secrets:
  api_key: bundle-api
  auth_key: bundle-auth
  gateway_token: bundle-gw
";

    #[tokio::test]
    async fn test_bundle_writes_base64_payload() {
        let dir = tempfile::tempdir().unwrap();
        let desc_path = dir.path().join("agent.yml");
        std::fs::write(&desc_path, DESCRIPTOR).unwrap();

        std::env::set_var("SKIFF_SECRET_BUNDLE_API", "value-api");
        std::env::set_var("SKIFF_SECRET_BUNDLE_AUTH", "value-auth");
        std::env::set_var("SKIFF_SECRET_BUNDLE_GW", "value-gw");

        let out_path = dir.path().join("payload.b64");
        execute(&desc_path, Backend::Hetzner, None, true, Some(&out_path))
            .await
            .unwrap();

        // Base64 of a gzip stream always opens with the magic prefix.
        let payload = std::fs::read_to_string(&out_path).unwrap();
        assert!(payload.starts_with("H4sI"));
    }

    #[tokio::test]
    async fn test_bundle_fails_when_secret_env_missing() {
        let dir = tempfile::tempdir().unwrap();
        let desc_path = dir.path().join("agent.yml");
        std::fs::write(
            &desc_path,
            "\
stack: fleet-test
agent: relay-3
secrets:
  api_key: bundle-absent-api
  auth_key: bundle-absent-auth
  gateway_token: bundle-absent-gw
",
        )
        .unwrap();

        let err = execute(&desc_path, Backend::Hetzner, None, true, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SKIFF_SECRET_BUNDLE_ABSENT"));
    }
}
