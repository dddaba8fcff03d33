//! Error types for Skiff operations.

use thiserror::Error;

/// The main error type for Skiff operations.
///
/// Covers every failure the bootstrap pipeline can report, from descriptor
/// validation through payload sizing. Error messages must never carry a
/// secret value; caller-supplied text is redacted before it lands here.
#[derive(Error, Debug)]
pub enum SkiffError {
    /// Descriptor validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflicting descriptor entries (e.g. duplicate plugin env vars)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Placeholders left unmatched after interpolation
    #[error("Unresolved secret placeholder(s): {}", .0.join(", "))]
    UnresolvedSecrets(Vec<String>),

    /// Compressed boot payload exceeds the backend's ceiling
    #[error("Boot payload is {actual} bytes after compression, exceeding the {ceiling}-byte ceiling")]
    PayloadTooLarge {
        /// Compressed size in bytes
        actual: usize,
        /// Backend ceiling in bytes
        ceiling: usize,
    },

    /// Gateway token derivation error
    #[error("Token derivation error: {0}")]
    Token(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal bug - should never happen in production
    #[error("Bug detected: {0}\n\nThis is an internal error. Please report this issue at:\nhttps://github.com/skiff-fleet/skiff/issues")]
    Bug(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// A specialized Result type for Skiff operations.
pub type Result<T> = std::result::Result<T, SkiffError>;

/// Helper macro to create and return a SkiffError::Bug
///
/// This should be used for conditions that should never occur
/// in normal operation and indicate a bug in Skiff itself.
///
/// # Example
///
/// ```ignore
/// if some_impossible_condition {
///     bug!("This should never happen: {:?}", condition);
/// }
/// ```
#[macro_export]
macro_rules! bug {
    ($msg:expr) => {
        return Err($crate::SkiffError::Bug($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::SkiffError::Bug(format!($fmt, $($arg)*)))
    };
}

/// Helper macro to bail out with a SkiffError
///
/// This is used for expected error conditions.
///
/// # Example
///
/// ```ignore
/// if !valid {
///     bail!(Validation, "Invalid descriptor: {}", reason);
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($variant:ident, $msg:expr) => {
        return Err($crate::SkiffError::$variant($msg.to_string()))
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::SkiffError::$variant(format!($fmt, $($arg)*)))
    };
    ($msg:expr) => {
        return Err($crate::SkiffError::Other($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::SkiffError::Other(format!($fmt, $($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_too_large_message_carries_both_counts() {
        let err = SkiffError::PayloadTooLarge {
            actual: 40_000,
            ceiling: 32_768,
        };
        let msg = err.to_string();
        assert!(msg.contains("40000"));
        assert!(msg.contains("32768"));
    }

    #[test]
    fn test_unresolved_secrets_lists_every_name() {
        let err = SkiffError::UnresolvedSecrets(vec![
            "search-api-key".to_string(),
            "plugin:BROWSER_TOKEN".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("search-api-key"));
        assert!(msg.contains("plugin:BROWSER_TOKEN"));
    }
}
