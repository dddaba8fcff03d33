//! Type-safe identifiers and hostname derivation.

use crate::errors::{Result, SkiffError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// A validated stack name.
///
/// Stack names must:
/// - Start with a lowercase letter or digit
/// - Contain only lowercase letters, digits, and hyphens
/// - Not end with a hyphen
///
/// # Example
///
/// ```
/// use skiff_types::StackName;
///
/// let stack = StackName::new("fleet-prod").unwrap();
/// assert_eq!(stack.as_str(), "fleet-prod");
///
/// // Invalid names are rejected
/// assert!(StackName::new("Fleet-Prod").is_err());
/// assert!(StackName::new("-fleet").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackName(String);

/// A validated agent name, same rules as [`StackName`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentName(String);

fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 40 {
        return false;
    }

    let mut chars = name.chars();
    let first = chars.next().unwrap();

    // Must start with lowercase letter or digit
    if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
        return false;
    }

    if name.ends_with('-') {
        return false;
    }

    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl StackName {
    /// Create a new validated stack name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name doesn't meet validation requirements.
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref();
        if !Self::is_valid(name) {
            crate::bail!(
                Validation,
                "Invalid stack name '{}': must contain only lowercase letters, digits, and hyphens, \
                and must start with a letter or digit",
                name
            );
        }
        Ok(Self(name.to_string()))
    }

    /// Check if a name is valid without allocating.
    pub fn is_valid(name: &str) -> bool {
        is_valid_name(name)
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AgentName {
    /// Create a new validated agent name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name doesn't meet validation requirements.
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref();
        if !Self::is_valid(name) {
            crate::bail!(
                Validation,
                "Invalid agent name '{}': must contain only lowercase letters, digits, and hyphens, \
                and must start with a letter or digit",
                name
            );
        }
        Ok(Self(name.to_string()))
    }

    /// Check if a name is valid without allocating.
    pub fn is_valid(name: &str) -> bool {
        is_valid_name(name)
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StackName {
    type Err = SkiffError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl FromStr for AgentName {
    type Err = SkiffError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// A machine hostname derived from a stack/agent pair.
///
/// The trailing suffix is the first 8 hex characters of
/// `sha256("{stack}/{agent}")`, which keeps hostnames distinct across
/// stacks that reuse agent names. Derivation is a pure function of its
/// inputs: the same pair always produces the same hostname, so the
/// bootstrap script generator stays deterministic.
///
/// # Example
///
/// ```
/// use skiff_types::{StackName, AgentName, Hostname};
///
/// let stack = StackName::new("fleet-prod").unwrap();
/// let agent = AgentName::new("scout-1").unwrap();
///
/// let a = Hostname::derive(&stack, &agent);
/// let b = Hostname::derive(&stack, &agent);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hostname(String);

impl Hostname {
    /// Derive the hostname for a stack/agent pair.
    pub fn derive(stack: &StackName, agent: &AgentName) -> Self {
        let digest = Sha256::digest(format!("{}/{}", stack, agent).as_bytes());
        let suffix = &hex::encode(digest)[..8];
        Self(format!("{}-{}-{}", stack, agent, suffix))
    }

    /// Get the hostname as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_validation() {
        assert!(StackName::new("valid-name").is_ok());
        assert!(StackName::new("valid123").is_ok());
        assert!(StackName::new("123valid").is_ok());

        assert!(StackName::new("Invalid-Name").is_err());
        assert!(StackName::new("-invalid").is_err());
        assert!(StackName::new("invalid-").is_err());
        assert!(StackName::new("").is_err());
        assert!(StackName::new("invalid_name").is_err());
        assert!(AgentName::new("UPPER").is_err());
    }

    #[test]
    fn test_hostname_is_deterministic() {
        let stack = StackName::new("fleet-prod").unwrap();
        let agent = AgentName::new("scout-1").unwrap();

        let a = Hostname::derive(&stack, &agent);
        let b = Hostname::derive(&stack, &agent);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("fleet-prod-scout-1-"));
        assert_eq!(a.as_str().len(), "fleet-prod-scout-1-".len() + 8);
    }

    #[test]
    fn test_hostname_distinguishes_stacks() {
        let agent = AgentName::new("scout-1").unwrap();
        let a = Hostname::derive(&StackName::new("fleet-prod").unwrap(), &agent);
        let b = Hostname::derive(&StackName::new("fleet-dev").unwrap(), &agent);
        assert_ne!(a, b);
    }
}
