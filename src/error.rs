//! Error types for lazyinit.
//!
//! Only a handful of conditions are ever allowed to reach a caller as an
//! `Err`: everything that happens inside a dispatch (initializer failures,
//! unknown parameters, buffer overflow) is recorded as a diagnostic line and
//! the barrier keeps moving. The variants here cover the load front door,
//! configuration loading and the policy tables.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for lazyinit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for lazyinit.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Load Request Errors
    // ========================================================================
    /// The requested component is neither deferred nor known to be built in.
    ///
    /// Only produced in strict mode; permissive mode records a diagnostic
    /// and reports success instead.
    #[error("failed to find a built-in component with the name \"{0}\"")]
    UnknownComponent(String),

    /// The caller is not allowed to submit load requests.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The submitted image failed structural validation.
    #[error("Invalid component image: {0}")]
    InvalidImage(#[from] crate::loader::ImageError),

    // ========================================================================
    // Policy Errors
    // ========================================================================
    /// A name appears in both the ignored and the eligible table.
    #[error("Policy conflict: '{name}' is listed as both ignored and eligible")]
    PolicyConflict {
        /// Conflicting component name
        name: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // ========================================================================
    // IO and Serialization Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new invalid config error.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns true if the boot sequence may keep going after this error.
    ///
    /// A strict-mode classification failure is the one condition that is
    /// meant to halt the caller.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::UnknownComponent(_))
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::UnknownComponent(_) => 2,
            Error::PermissionDenied(_) => 3,
            Error::InvalidImage(_) => 4,
            Error::PolicyConflict { .. } | Error::Config(_) | Error::InvalidConfig { .. } => 5,
            _ => 1,
        }
    }
}
