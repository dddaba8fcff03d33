//! Bootstrap script template generation.
//!
//! Renders a [`BootstrapDescriptor`] into the shell script a freshly booted
//! machine executes as cloud-init user data. The script carries only
//! literal configuration; every secret is represented by a `<secret:NAME>`
//! placeholder. The generator also records, in output order, the names it
//! referenced — that ordered list is the contract the interpolator and the
//! surrounding resource graph resolve bindings against.
//!
//! Generation is deterministic: the only entropy (the hostname suffix) is
//! derived from caller-supplied stack/agent names during normalization.

use crate::descriptor::{BootstrapDescriptor, PluginValue};
use skiff_types::{bail, bug, Result};
use tracing::debug;

/// Heredoc delimiter used for embedded file bodies.
const HEREDOC: &str = "SKIFF_EOF";

/// Placeholder name prefix for plugin secrets.
pub const PLUGIN_SECRET_PREFIX: &str = "plugin:";

/// A generated bootstrap script: placeholder tokens, zero secret values.
///
/// Safe to log, diff, or cache.
#[derive(Debug, Clone)]
pub struct GeneratedScript {
    text: String,
    secret_names: Vec<String>,
}

impl GeneratedScript {
    /// The script text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Secret names referenced by the script, in output order.
    pub fn secret_names(&self) -> &[String] {
        &self.secret_names
    }

    #[cfg(test)]
    pub(crate) fn from_parts(text: impl Into<String>, secret_names: Vec<String>) -> Self {
        Self {
            text: text.into(),
            secret_names,
        }
    }
}

/// Format the placeholder token for a secret name.
pub fn placeholder(name: &str) -> String {
    format!("<secret:{}>", name)
}

/// Script emitter tracking referenced secret names.
struct Emitter {
    out: String,
    secret_names: Vec<String>,
}

impl Emitter {
    fn new() -> Self {
        Self {
            out: String::new(),
            secret_names: Vec::new(),
        }
    }

    fn line(&mut self, s: &str) {
        self.out.push_str(s);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Emit a heredoc-embedded file body, refusing content that would
    /// terminate the heredoc early.
    fn heredoc_body(&mut self, content: &str) -> Result<()> {
        if content.lines().any(|l| l.trim() == HEREDOC) {
            bail!(
                Validation,
                "Embedded file content contains the reserved delimiter '{}'",
                HEREDOC
            );
        }
        self.out.push_str(content);
        if !content.ends_with('\n') {
            self.out.push('\n');
        }
        self.line(HEREDOC);
        Ok(())
    }

    /// Record a secret reference and return its placeholder token.
    ///
    /// Each name may be referenced exactly once. Normalization rejects
    /// duplicate slot declarations, so a repeat here is an internal fault.
    fn secret(&mut self, name: &str) -> Result<String> {
        if self.secret_names.iter().any(|n| n == name) {
            bug!(
                "Secret '{}' referenced more than once during generation",
                name
            );
        }
        self.secret_names.push(name.to_string());
        Ok(placeholder(name))
    }
}

/// Single-quote a string for safe embedding in shell.
fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Render a descriptor into a bootstrap script.
///
/// Identical descriptors always produce identical scripts. Exactly one
/// placeholder is emitted per referenced secret slot, and the ordered name
/// list travels with the script.
pub fn generate(desc: &BootstrapDescriptor) -> Result<GeneratedScript> {
    let mut e = Emitter::new();

    e.line("#!/usr/bin/env bash");
    e.line(&format!("# cloud-init user data for {}", desc.hostname));
    e.line("set -euo pipefail");
    e.blank();

    e.line(&format!(
        "hostnamectl set-hostname {}",
        sh_quote(desc.hostname.as_str())
    ));
    e.blank();

    if desc.create_default_user {
        e.line("useradd --create-home --shell /bin/bash agent 2>/dev/null || true");
        e.blank();
    }

    e.line("install -d -m 0755 /opt/agent/workspace");
    for (path, content) in &desc.workspace_files {
        e.line(&format!(
            "install -d -m 0755 \"$(dirname {})\"",
            sh_quote(&format!("/opt/agent/workspace/{}", path))
        ));
        e.line(&format!(
            "cat > {} <<'{}'",
            sh_quote(&format!("/opt/agent/workspace/{}", path)),
            HEREDOC
        ));
        e.heredoc_body(content)?;
    }
    e.blank();

    // Environment file: literal configuration first, then one placeholder
    // per secret slot. Quoted heredoc keeps the body out of shell expansion.
    e.line("install -d -m 0700 /etc/agent");
    e.line(&format!("cat > /etc/agent/agent.env <<'{}'", HEREDOC));
    e.line(&format!("MODEL={}", desc.model));
    e.line(&format!("GATEWAY_PORT={}", desc.gateway_port));
    e.line(&format!("SANDBOX={}", desc.sandbox));
    e.line(&format!("FUNNEL={}", desc.funnel));
    for (key, value) in &desc.env {
        e.line(&format!("{}={}", key, value));
    }
    let api = e.secret(&desc.secrets.api_key)?;
    e.line(&format!("API_KEY={}", api));
    let auth = e.secret(&desc.secrets.auth_key)?;
    e.line(&format!("AUTH_KEY={}", auth));
    let gateway = e.secret(&desc.secrets.gateway_token)?;
    e.line(&format!("GATEWAY_TOKEN={}", gateway));
    if let Some(slot) = &desc.secrets.github_token {
        let tok = e.secret(slot)?;
        e.line(&format!("GITHUB_TOKEN={}", tok));
    }
    if let Some(slot) = &desc.secrets.search_api_key {
        let tok = e.secret(slot)?;
        e.line(&format!("SEARCH_API_KEY={}", tok));
    }
    for plugin in &desc.plugins {
        for value in plugin.config.values() {
            if let PluginValue::Secret { env, .. } = value {
                let tok = e.secret(&format!("{}{}", PLUGIN_SECRET_PREFIX, env))?;
                e.line(&format!("{}={}", env, tok));
            }
        }
    }
    e.line(HEREDOC);
    e.line("chmod 0600 /etc/agent/agent.env");
    e.blank();

    for plugin in &desc.plugins {
        let mut cmd = format!("agent plugin install {}", sh_quote(&plugin.id));
        for (key, value) in &plugin.config {
            match value {
                PluginValue::Literal(v) => {
                    cmd.push_str(&format!(" --set {}", sh_quote(&format!("{}={}", key, v))));
                }
                PluginValue::Secret { env, .. } => {
                    cmd.push_str(&format!(
                        " --set {}",
                        sh_quote(&format!("{}=env:{}", key, env))
                    ));
                }
            }
        }
        e.line(&cmd);
    }
    if !desc.plugins.is_empty() {
        e.blank();
    }

    for cmd in &desc.post_setup {
        e.line(cmd);
    }
    if !desc.post_setup.is_empty() {
        e.blank();
    }

    let service_user = if desc.create_default_user {
        "agent"
    } else {
        "root"
    };
    e.line(&format!(
        "cat > /etc/systemd/system/agent.service <<'{}'",
        HEREDOC
    ));
    e.line("[Unit]");
    e.line("Description=Skiff agent");
    e.line("After=network-online.target");
    e.line("Wants=network-online.target");
    e.blank();
    e.line("[Service]");
    e.line(&format!("User={}", service_user));
    e.line("EnvironmentFile=/etc/agent/agent.env");
    let mut exec = String::from("ExecStart=/usr/local/bin/agent serve --workspace /opt/agent/workspace");
    if desc.sandbox {
        exec.push_str(" --sandbox");
    }
    if desc.funnel {
        exec.push_str(" --funnel");
    }
    e.line(&exec);
    e.line("Restart=always");
    e.line("RestartSec=5");
    e.blank();
    e.line("[Install]");
    e.line("WantedBy=multi-user.target");
    e.line(HEREDOC);
    e.blank();

    if desc.create_default_user {
        e.line("chown -R agent:agent /opt/agent");
    }
    e.line("systemctl daemon-reload");
    e.line("systemctl enable --now agent.service");

    debug!(
        hostname = %desc.hostname,
        secrets = e.secret_names.len(),
        bytes = e.out.len(),
        "Generated bootstrap script"
    );

    Ok(GeneratedScript {
        text: e.out,
        secret_names: e.secret_names,
    })
}
