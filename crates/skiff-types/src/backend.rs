//! Cloud backend enumeration and payload ceilings.

use crate::errors::{Result, SkiffError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud backends a machine can be provisioned on.
///
/// Each backend imposes a hard ceiling on the boot-data payload it will
/// accept for a new machine. The pipeline sizes the compressed bootstrap
/// script against the active backend's ceiling and fails cleanly rather
/// than truncate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Hetzner Cloud (32 KiB user data)
    Hetzner,
    /// Amazon EC2 (16 KiB user data)
    Aws,
}

impl Backend {
    /// Maximum boot-data payload size in bytes.
    pub fn payload_ceiling(&self) -> usize {
        match self {
            Backend::Hetzner => 32 * 1024,
            Backend::Aws => 16 * 1024,
        }
    }
}

impl FromStr for Backend {
    type Err = SkiffError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "hetzner" => Ok(Backend::Hetzner),
            "aws" | "ec2" => Ok(Backend::Aws),
            _ => crate::bail!(Validation, "Invalid backend: {}", s),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Hetzner => write!(f, "hetzner"),
            Backend::Aws => write!(f, "aws"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceilings() {
        assert_eq!(Backend::Hetzner.payload_ceiling(), 32_768);
        assert_eq!(Backend::Aws.payload_ceiling(), 16_384);
    }

    #[test]
    fn test_parse() {
        assert_eq!("hetzner".parse::<Backend>().unwrap(), Backend::Hetzner);
        assert_eq!("EC2".parse::<Backend>().unwrap(), Backend::Aws);
        assert!("azure".parse::<Backend>().is_err());
    }
}
