//! Bootstrap descriptor normalization and validation.
//!
//! Callers hand in a sparse [`DescriptorInput`] (usually deserialized from
//! YAML); [`normalize`] fills in documented defaults and validates the
//! result into an immutable [`BootstrapDescriptor`]. A descriptor never
//! holds a secret's literal value: secret slots are referenced by symbolic
//! name only, and values arrive separately at interpolation time.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use skiff_types::{bail, AgentName, Hostname, Result, StackName};
use std::collections::HashMap;

/// Default model identifier when the caller does not choose one.
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

/// Default gateway port.
pub const DEFAULT_GATEWAY_PORT: u16 = 18789;

/// Symbolic name of the required API key slot.
pub const SLOT_API_KEY: &str = "api-key";
/// Symbolic name of the required auth key slot.
pub const SLOT_AUTH_KEY: &str = "auth-key";
/// Symbolic name of the derived gateway token slot.
pub const SLOT_GATEWAY_TOKEN: &str = "gateway-token";
/// Symbolic name of the optional GitHub token slot.
pub const SLOT_GITHUB_TOKEN: &str = "github-token";
/// Symbolic name of the optional search API key slot.
pub const SLOT_SEARCH_API_KEY: &str = "search-api-key";

/// Environment variable names the generator writes itself; user-supplied
/// env entries may not shadow them.
const RESERVED_ENV: &[&str] = &[
    "MODEL",
    "GATEWAY_PORT",
    "SANDBOX",
    "FUNNEL",
    "API_KEY",
    "AUTH_KEY",
    "GATEWAY_TOKEN",
    "GITHUB_TOKEN",
    "SEARCH_API_KEY",
];

/// Sparse caller input for one agent machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorInput {
    /// Stack this agent belongs to.
    pub stack: StackName,

    /// Agent name, unique within the stack.
    pub agent: AgentName,

    /// Model identifier (defaults to [`DEFAULT_MODEL`]).
    #[serde(default)]
    pub model: Option<String>,

    /// Gateway port (defaults to [`DEFAULT_GATEWAY_PORT`]).
    #[serde(default)]
    pub gateway_port: Option<u16>,

    /// Run the agent inside its sandbox (defaults to true).
    #[serde(default)]
    pub sandbox: Option<bool>,

    /// Expose the gateway through a public funnel (defaults to false).
    #[serde(default)]
    pub funnel: Option<bool>,

    /// Create the unprivileged `agent` user (defaults to true).
    #[serde(default)]
    pub create_default_user: Option<bool>,

    /// Workspace files to place under the agent's workspace, path → content.
    #[serde(default)]
    pub workspace_files: IndexMap<String, String>,

    /// Extra environment variables for the agent process.
    #[serde(default)]
    pub env: IndexMap<String, String>,

    /// Shell commands run after setup, in order.
    #[serde(default)]
    pub post_setup: Vec<String>,

    /// Plugins to install, in order.
    #[serde(default)]
    pub plugins: Vec<PluginInput>,

    /// Secret slot declarations.
    #[serde(default)]
    pub secrets: SecretSlotsInput,

    /// Declared plugin-secret slot names. Every plugin config value that
    /// references a secret must name one of these.
    #[serde(default)]
    pub plugin_secret_slots: Vec<String>,
}

/// Caller-declared secret slots. Values are symbolic slot names, never
/// credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretSlotsInput {
    /// API key slot (required).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Auth key slot (required).
    #[serde(default)]
    pub auth_key: Option<String>,

    /// Gateway token slot (defaults to [`SLOT_GATEWAY_TOKEN`]).
    #[serde(default)]
    pub gateway_token: Option<String>,

    /// GitHub token slot (optional).
    #[serde(default)]
    pub github_token: Option<String>,

    /// Search API key slot (optional).
    #[serde(default)]
    pub search_api_key: Option<String>,
}

/// One plugin install request from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInput {
    /// Plugin identifier.
    pub id: String,

    /// Plugin configuration values, in order.
    #[serde(default)]
    pub config: IndexMap<String, PluginValue>,
}

/// A plugin configuration value: either a literal, or a reference to a
/// declared plugin-secret slot delivered through an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginValue {
    /// Literal configuration value, rendered into the script as-is.
    Literal(String),
    /// Secret reference: the slot's value is written to `env` at boot.
    Secret {
        /// Environment variable the value is delivered through.
        env: String,
        /// Declared plugin-secret slot name.
        slot: String,
    },
}

/// A validated plugin install entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInstallEntry {
    /// Plugin identifier.
    pub id: String,
    /// Plugin configuration values, in order.
    pub config: IndexMap<String, PluginValue>,
}

/// Declared secret slots after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSlots {
    /// API key slot name.
    pub api_key: String,
    /// Auth key slot name.
    pub auth_key: String,
    /// Gateway token slot name.
    pub gateway_token: String,
    /// GitHub token slot name, if declared.
    pub github_token: Option<String>,
    /// Search API key slot name, if declared.
    pub search_api_key: Option<String>,
}

/// A complete, validated bootstrap descriptor.
///
/// Immutable value; construct via [`normalize`].
#[derive(Debug, Clone)]
pub struct BootstrapDescriptor {
    /// Stack name.
    pub stack: StackName,
    /// Agent name.
    pub agent: AgentName,
    /// Derived machine hostname.
    pub hostname: Hostname,
    /// Model identifier.
    pub model: String,
    /// Gateway port.
    pub gateway_port: u16,
    /// Sandbox enabled.
    pub sandbox: bool,
    /// Public funnel enabled.
    pub funnel: bool,
    /// Create the unprivileged default user.
    pub create_default_user: bool,
    /// Workspace files, path → content.
    pub workspace_files: IndexMap<String, String>,
    /// Extra environment variables.
    pub env: IndexMap<String, String>,
    /// Post-setup shell commands.
    pub post_setup: Vec<String>,
    /// Plugin install entries.
    pub plugins: Vec<PluginInstallEntry>,
    /// Declared secret slots.
    pub secrets: SecretSlots,
}

fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Slot names must stay inside the placeholder token charset (colon
/// excluded; it separates the plugin namespace). Anything wider would
/// generate a `<secret:...>` token the interpolator cannot match, and an
/// unmatched token reaching the machine executes verbatim at boot.
fn validate_slot_name(name: &str, field: &str) -> Result<()> {
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        bail!(
            Validation,
            "Secret slot '{}' for {}: slot names may contain only letters, digits, hyphens, and underscores",
            name,
            field
        );
    }
    Ok(())
}

fn require_slot(slot: Option<String>, field: &str) -> Result<String> {
    let name = match slot {
        Some(name) if !name.trim().is_empty() => name,
        _ => bail!(Validation, "Required secret slot '{}' is absent or empty", field),
    };
    validate_slot_name(&name, field)?;
    Ok(name)
}

/// Normalize sparse caller input into a complete descriptor.
///
/// Substitutes documented defaults, derives the hostname from the
/// stack/agent pair, and validates everything the later stages rely on.
///
/// # Errors
///
/// - `Validation` when a required secret slot (API key, auth key) is
///   absent or empty, a slot name falls outside the placeholder charset,
///   a plugin references an undeclared secret slot, an environment
///   variable name is malformed or reserved, an environment value or the
///   model identifier embeds a newline, or a workspace path escapes the
///   workspace.
/// - `Conflict` when the same slot name is declared for two different
///   core slots, or two plugins declare the same secret environment
///   variable name.
pub fn normalize(input: DescriptorInput) -> Result<BootstrapDescriptor> {
    let secrets = SecretSlots {
        api_key: require_slot(input.secrets.api_key, "api_key")?,
        auth_key: require_slot(input.secrets.auth_key, "auth_key")?,
        gateway_token: require_slot(
            Some(
                input
                    .secrets
                    .gateway_token
                    .unwrap_or_else(|| SLOT_GATEWAY_TOKEN.to_string()),
            ),
            "gateway_token",
        )?,
        github_token: match input.secrets.github_token {
            Some(name) => Some(require_slot(Some(name), "github_token")?),
            None => None,
        },
        search_api_key: match input.secrets.search_api_key {
            Some(name) => Some(require_slot(Some(name), "search_api_key")?),
            None => None,
        },
    };

    // Each core slot becomes exactly one placeholder; one name claimed by
    // two slots would collapse them into a single substitution.
    let mut declared: Vec<&str> = vec![
        secrets.api_key.as_str(),
        secrets.auth_key.as_str(),
        secrets.gateway_token.as_str(),
    ];
    declared.extend(secrets.github_token.as_deref());
    declared.extend(secrets.search_api_key.as_deref());
    for (i, name) in declared.iter().enumerate() {
        if declared[..i].contains(name) {
            bail!(
                Conflict,
                "Secret slot name '{}' is declared for more than one core slot",
                name
            );
        }
    }

    if let Some(model) = &input.model {
        if model.contains('\n') || model.contains('\r') {
            bail!(Validation, "Model identifier must not contain newlines");
        }
    }

    for (name, value) in &input.env {
        if !is_valid_env_name(name) {
            bail!(Validation, "Invalid environment variable name '{}'", name);
        }
        if RESERVED_ENV.contains(&name.as_str()) {
            bail!(
                Validation,
                "Environment variable '{}' is reserved for the bootstrap script",
                name
            );
        }
        // Values land on single lines inside the env-file heredoc; an
        // embedded newline would terminate the heredoc and inject the
        // remainder as script.
        if value.contains('\n') || value.contains('\r') {
            bail!(
                Validation,
                "Environment variable '{}' value must not contain newlines",
                name
            );
        }
    }

    for path in input.workspace_files.keys() {
        if path.is_empty() || path.starts_with('/') || path.split('/').any(|seg| seg == "..") {
            bail!(
                Validation,
                "Workspace file path '{}' must be relative and stay inside the workspace",
                path
            );
        }
    }

    // Plugin secret references: declared slot, valid env name, no env var
    // claimed by two plugins. Last-write-wins here would silently bind one
    // plugin's credential to another's variable, so duplicates are a hard
    // conflict.
    let mut env_owner: HashMap<&str, &str> = HashMap::new();
    for plugin in &input.plugins {
        for (key, value) in &plugin.config {
            if let PluginValue::Secret { env, slot } = value {
                if !is_valid_env_name(env) {
                    bail!(
                        Validation,
                        "Plugin '{}' config '{}': invalid environment variable name '{}'",
                        plugin.id,
                        key,
                        env
                    );
                }
                if RESERVED_ENV.contains(&env.as_str()) {
                    bail!(
                        Validation,
                        "Plugin '{}' config '{}': environment variable '{}' is reserved",
                        plugin.id,
                        key,
                        env
                    );
                }
                if !input.plugin_secret_slots.iter().any(|s| s == slot) {
                    bail!(
                        Validation,
                        "Plugin '{}' config '{}' references undeclared secret slot '{}'",
                        plugin.id,
                        key,
                        slot
                    );
                }
                if let Some(owner) = env_owner.insert(env.as_str(), plugin.id.as_str()) {
                    bail!(
                        Conflict,
                        "Secret environment variable '{}' is declared by both plugin '{}' and plugin '{}'",
                        env,
                        owner,
                        plugin.id
                    );
                }
            }
        }
    }

    let hostname = Hostname::derive(&input.stack, &input.agent);

    Ok(BootstrapDescriptor {
        stack: input.stack,
        agent: input.agent,
        hostname,
        model: input.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        gateway_port: input.gateway_port.unwrap_or(DEFAULT_GATEWAY_PORT),
        sandbox: input.sandbox.unwrap_or(true),
        funnel: input.funnel.unwrap_or(false),
        create_default_user: input.create_default_user.unwrap_or(true),
        workspace_files: input.workspace_files,
        env: input.env,
        post_setup: input.post_setup,
        plugins: input
            .plugins
            .into_iter()
            .map(|p| PluginInstallEntry {
                id: p.id,
                config: p.config,
            })
            .collect(),
        secrets,
    })
}
