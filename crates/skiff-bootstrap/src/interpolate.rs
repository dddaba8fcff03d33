//! Secret interpolation.
//!
//! Replaces every `<secret:NAME>` placeholder in a generated script with
//! the resolved value from a [`SecretBindings`] map. This is the only
//! stage that ever sees secret material next to the script body, and it
//! runs last before compression. An un-substituted placeholder would be
//! executed verbatim by the booting machine (a config value where a
//! credential belongs), so any unmatched placeholder is fatal. A binding
//! with no matching placeholder usually means caller/template drift; it is
//! logged as a warning, never an error.

use crate::redact::redact;
use crate::template::{GeneratedScript, PLUGIN_SECRET_PREFIX};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use skiff_types::{bug, Result, SkiffError};
use std::collections::HashSet;
use tracing::{debug, warn};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<secret:([A-Za-z0-9_:-]+)>").expect("placeholder regex is valid")
});

// Catch-all for the final sweep. Deliberately wider than the token charset:
// anything that still looks placeholder-shaped after substitution must not
// reach the machine, well-formed or not.
static PLACEHOLDER_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<secret:[^>]*>").expect("placeholder sweep regex is valid"));

/// Resolved secret values, keyed by slot name.
///
/// Plugin secrets live in their own keyed sub-map (environment-variable
/// name → value); lookups for `plugin:ENV` names route there. Keyed
/// lookup everywhere — nothing in the pipeline ever zips a name list
/// against a value list by position.
#[derive(Default, Clone)]
pub struct SecretBindings {
    slots: IndexMap<String, String>,
    plugins: IndexMap<String, String>,
}

impl SecretBindings {
    /// Create an empty bindings map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a core secret slot.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.slots.insert(name.into(), value.into());
    }

    /// Bind a plugin secret by its environment-variable name.
    pub fn insert_plugin(&mut self, env: impl Into<String>, value: impl Into<String>) {
        self.plugins.insert(env.into(), value.into());
    }

    /// Look up a value by placeholder name.
    pub fn get(&self, name: &str) -> Option<&str> {
        match name.strip_prefix(PLUGIN_SECRET_PREFIX) {
            Some(env) => self.plugins.get(env).map(String::as_str),
            None => self.slots.get(name).map(String::as_str),
        }
    }

    /// All binding names in insertion order, plugin names prefixed.
    pub fn names(&self) -> Vec<String> {
        self.slots
            .keys()
            .cloned()
            .chain(
                self.plugins
                    .keys()
                    .map(|env| format!("{}{}", PLUGIN_SECRET_PREFIX, env)),
            )
            .collect()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.slots.len() + self.plugins.len()
    }

    /// True when no bindings are present.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.plugins.is_empty()
    }
}

// Bindings hold live credentials; keep them out of {:?} output entirely.
impl std::fmt::Debug for SecretBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBindings")
            .field("slots", &self.slots.keys().collect::<Vec<_>>())
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A fully-interpolated bootstrap script. No placeholder pattern remains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpolatedScript(String);

impl InterpolatedScript {
    /// The script text.
    pub fn text(&self) -> &str {
        &self.0
    }

    /// The script bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[cfg(test)]
    pub(crate) fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

/// Interpolation result: the script plus any unused-binding warnings.
#[derive(Debug)]
pub struct Interpolated {
    /// The fully-substituted script.
    pub script: InterpolatedScript,
    /// Binding names that matched no placeholder (soft drift signal).
    pub unused: Vec<String>,
}

/// Substitute every placeholder in `script` from `bindings`.
///
/// # Errors
///
/// `UnresolvedSecrets` listing every placeholder with no binding. Returns
/// a `Bug` if any placeholder pattern survives substitution — that would
/// mean the script reached the machine with a marker where a credential
/// belongs.
pub fn interpolate(script: &GeneratedScript, bindings: &SecretBindings) -> Result<Interpolated> {
    let mut referenced: HashSet<&str> = HashSet::new();
    let mut unresolved: Vec<String> = Vec::new();

    for cap in PLACEHOLDER.captures_iter(script.text()) {
        let name = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
        referenced.insert(name);
        if bindings.get(name).is_none() && !unresolved.iter().any(|n| n == name) {
            unresolved.push(name.to_string());
        }
    }

    if !unresolved.is_empty() {
        return Err(SkiffError::UnresolvedSecrets(unresolved));
    }

    let substituted = PLACEHOLDER.replace_all(script.text(), |cap: &regex::Captures<'_>| {
        let name = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
        // Presence was verified above.
        bindings.get(name).unwrap_or_default().to_string()
    });

    if PLACEHOLDER_ANY.is_match(&substituted) {
        bug!("Placeholder pattern survived interpolation");
    }

    let unused: Vec<String> = bindings
        .names()
        .into_iter()
        .filter(|name| !referenced.contains(name.as_str()))
        .collect();

    for name in &unused {
        // Names only; values never reach the log. Redact anyway in case a
        // caller smuggled something credential-shaped into a slot name.
        warn!(binding = %redact(name), "Unused secret binding (caller/template drift?)");
    }

    debug!(
        placeholders = referenced.len(),
        unused = unused.len(),
        "Interpolated bootstrap script"
    );

    Ok(Interpolated {
        script: InterpolatedScript(substituted.into_owned()),
        unused,
    })
}
