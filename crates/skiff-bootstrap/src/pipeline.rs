//! Pipeline orchestration and secret fan-in.
//!
//! [`BootstrapPipeline`] runs the pure stages in order: normalize →
//! generate → interpolate → compress. [`SecretResolver`] sits at the
//! boundary with the resource graph: secret values are produced by
//! independent async tasks (vault reads, token derivation, provider
//! outputs), and the resolver joins them all into one fully-resolved
//! [`SecretBindings`] before interpolation starts. A single failing
//! producer aborts the whole provisioning attempt; no partial script is
//! ever emitted.

use crate::compress::{compress, CompressedPayload};
use crate::descriptor::{normalize, DescriptorInput};
use crate::interpolate::{interpolate, SecretBindings};
use crate::template::generate;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use skiff_types::{Backend, Hostname, Result};
use std::future::Future;
use tracing::{debug, info};

/// Result of a full pipeline run.
#[derive(Debug)]
pub struct BootstrapBundle {
    /// Derived machine hostname.
    pub hostname: Hostname,
    /// Compressed boot payload, within the backend's ceiling.
    pub payload: CompressedPayload,
    /// Secret names the script referenced, in output order.
    pub secret_names: Vec<String>,
    /// Supplied bindings that matched no placeholder.
    pub unused_bindings: Vec<String>,
}

/// The bootstrap composition pipeline for one agent machine.
///
/// Stateless apart from the target backend; runs for different agents are
/// fully independent and may execute in parallel.
#[derive(Debug, Clone)]
pub struct BootstrapPipeline {
    backend: Backend,
    ceiling: Option<usize>,
}

impl BootstrapPipeline {
    /// Create a pipeline targeting `backend`.
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            ceiling: None,
        }
    }

    /// Override the backend's payload ceiling (testing and constrained
    /// images).
    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// The active payload ceiling in bytes.
    pub fn ceiling(&self) -> usize {
        self.ceiling.unwrap_or_else(|| self.backend.payload_ceiling())
    }

    /// Run the full pipeline: normalize, generate, interpolate, compress.
    pub fn run(&self, input: DescriptorInput, bindings: &SecretBindings) -> Result<BootstrapBundle> {
        info!(backend = %self.backend, "Starting bootstrap pipeline");

        debug!("Step 1: Normalize descriptor");
        let descriptor = normalize(input)?;

        debug!("Step 2: Generate bootstrap script");
        let script = generate(&descriptor)?;

        debug!("Step 3: Interpolate secrets");
        let interpolated = interpolate(&script, bindings)?;

        debug!("Step 4: Compress payload");
        let payload = compress(&interpolated.script, self.ceiling())?;

        info!(
            hostname = %descriptor.hostname,
            payload_bytes = payload.len(),
            "Bootstrap pipeline completed successfully"
        );

        Ok(BootstrapBundle {
            hostname: descriptor.hostname,
            payload,
            secret_names: script.secret_names().to_vec(),
            unused_bindings: interpolated.unused,
        })
    }
}

enum BindingKey {
    Slot(String),
    Plugin(String),
}

/// Fan-in for independently-async secret producers.
///
/// Each producer is registered under the key it binds; the key travels
/// with the future, so completion order among producers is irrelevant and
/// there is no positional zipping to get wrong.
///
/// # Example
///
/// ```
/// # use skiff_bootstrap::SecretResolver;
/// # async fn demo() -> skiff_types::Result<()> {
/// let bindings = SecretResolver::new()
///     .slot("api-key", async { Ok("value-a".to_string()) })
///     .plugin("BROWSER_TOKEN", async { Ok("value-b".to_string()) })
///     .resolve()
///     .await?;
/// assert_eq!(bindings.get("api-key"), Some("value-a"));
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SecretResolver {
    tasks: Vec<BoxFuture<'static, Result<(BindingKey, String)>>>,
}

impl SecretResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a producer for a core secret slot.
    pub fn slot<F>(mut self, name: impl Into<String>, producer: F) -> Self
    where
        F: Future<Output = Result<String>> + Send + 'static,
    {
        let name = name.into();
        self.tasks
            .push(async move { Ok((BindingKey::Slot(name), producer.await?)) }.boxed());
        self
    }

    /// Register a producer for a plugin secret, keyed by its environment
    /// variable name.
    pub fn plugin<F>(mut self, env: impl Into<String>, producer: F) -> Self
    where
        F: Future<Output = Result<String>> + Send + 'static,
    {
        let env = env.into();
        self.tasks
            .push(async move { Ok((BindingKey::Plugin(env), producer.await?)) }.boxed());
        self
    }

    /// Await every producer and assemble the keyed bindings map.
    ///
    /// Wait-for-all semantics: any producer failure fails the whole join.
    pub async fn resolve(self) -> Result<SecretBindings> {
        debug!(producers = self.tasks.len(), "Joining secret producers");
        let pairs = try_join_all(self.tasks).await?;

        let mut bindings = SecretBindings::new();
        for (key, value) in pairs {
            match key {
                BindingKey::Slot(name) => bindings.insert(name, value),
                BindingKey::Plugin(env) => bindings.insert_plugin(env, value),
            }
        }
        Ok(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::tests::{base_input, plugin_secret};
    use crate::descriptor::PluginInput;
    use indexmap::IndexMap;
    use skiff_types::SkiffError;
    use std::time::Duration;

    fn base_bindings() -> SecretBindings {
        let mut b = SecretBindings::new();
        b.insert("api-key", "value-api");
        b.insert("auth-key", "value-auth");
        b.insert("gateway-token", "value-gateway");
        b
    }

    #[test]
    fn test_full_run_round_trips() {
        let pipeline = BootstrapPipeline::new(Backend::Hetzner);
        let bundle = pipeline.run(base_input(), &base_bindings()).unwrap();

        assert!(bundle.payload.len() <= 32_768);
        assert!(bundle.unused_bindings.is_empty());
        assert_eq!(
            bundle.secret_names,
            vec!["api-key", "auth-key", "gateway-token"]
        );

        let text = crate::compress::decompress(&bundle.payload).unwrap();
        assert!(text.contains(&format!("hostnamectl set-hostname '{}'", bundle.hostname)));
        assert!(text.contains("API_KEY=value-api"));
        assert!(!text.contains("<secret:"));
    }

    #[test]
    fn test_large_compressible_descriptor_fits() {
        // ~40 KB of plaintext that compresses far below the 32 KiB ceiling.
        let mut input = base_input();
        input.workspace_files.insert(
            "corpus.txt".to_string(),
            "the same instruction line repeats here\n".repeat(1_024),
        );

        let pipeline = BootstrapPipeline::new(Backend::Hetzner);
        let bundle = pipeline.run(input, &base_bindings()).unwrap();
        assert!(bundle.payload.len() <= 32_768);

        let text = crate::compress::decompress(&bundle.payload).unwrap();
        assert!(text.len() >= 40_000);
    }

    #[test]
    fn test_oversized_payload_fails_before_any_resource() {
        // High-entropy workspace content gzip cannot usefully shrink.
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut blob = String::new();
        while blob.len() < 96_000 {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            blob.push_str(&format!("{:016x}", state));
        }
        let mut input = base_input();
        input.workspace_files.insert("noise.txt".to_string(), blob);

        let pipeline = BootstrapPipeline::new(Backend::Hetzner);
        let err = pipeline.run(input, &base_bindings()).unwrap_err();
        match err {
            SkiffError::PayloadTooLarge { actual, ceiling } => {
                assert_eq!(ceiling, 32_768);
                assert!(actual > ceiling);
            }
            other => panic!("expected PayloadTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_ceiling_override() {
        let pipeline = BootstrapPipeline::new(Backend::Hetzner).with_ceiling(16);
        let err = pipeline.run(base_input(), &base_bindings()).unwrap_err();
        assert!(matches!(err, SkiffError::PayloadTooLarge { ceiling: 16, .. }));
    }

    #[tokio::test]
    async fn test_resolver_joins_regardless_of_completion_order() {
        let bindings = SecretResolver::new()
            .slot("api-key", async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok("value-api".to_string())
            })
            .slot("auth-key", async { Ok("value-auth".to_string()) })
            .plugin("BROWSER_TOKEN", async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok("value-browser".to_string())
            })
            .resolve()
            .await
            .unwrap();

        assert_eq!(bindings.get("api-key"), Some("value-api"));
        assert_eq!(bindings.get("auth-key"), Some("value-auth"));
        assert_eq!(bindings.get("plugin:BROWSER_TOKEN"), Some("value-browser"));
        assert_eq!(bindings.len(), 3);
    }

    #[tokio::test]
    async fn test_resolver_failure_aborts_join() {
        let result = SecretResolver::new()
            .slot("api-key", async { Ok("value-api".to_string()) })
            .slot("auth-key", async {
                Err(SkiffError::Other("vault unreachable".to_string()))
            })
            .resolve()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resolved_bindings_feed_pipeline_with_plugins() {
        let mut input = base_input();
        input.plugin_secret_slots = vec!["browser-token".to_string()];
        input.plugins.push(PluginInput {
            id: "browser".to_string(),
            config: IndexMap::from([(
                "token".to_string(),
                plugin_secret("BROWSER_TOKEN", "browser-token"),
            )]),
        });

        let bindings = SecretResolver::new()
            .slot("api-key", async { Ok("value-api".to_string()) })
            .slot("auth-key", async { Ok("value-auth".to_string()) })
            .slot("gateway-token", async { Ok("value-gateway".to_string()) })
            .plugin("BROWSER_TOKEN", async { Ok("value-browser".to_string()) })
            .resolve()
            .await
            .unwrap();

        let pipeline = BootstrapPipeline::new(Backend::Aws);
        let bundle = pipeline.run(input, &bindings).unwrap();
        let text = crate::compress::decompress(&bundle.payload).unwrap();
        assert!(text.contains("BROWSER_TOKEN=value-browser"));
    }
}
