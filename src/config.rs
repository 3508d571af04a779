//! Configuration module for lazyinit
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/lazyinit/lazyinit.toml)
//! - User configuration (~/.lazyinit.toml)
//! - Project configuration (./lazyinit.toml)
//! - Environment variables

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::diagnostics::DEFAULT_BUFFER_CAPACITY;
use crate::dispatch::{ClassificationMode, DEFAULT_GRACE_PERIOD, DEFAULT_REPORT_INTERVAL};
use crate::error::Error;
use crate::policy::PolicyTables;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Classification severity
    pub mode: ModeConfig,

    /// Periodic reporter settings
    pub reporter: ReporterConfig,

    /// Failure buffer settings
    pub diagnostics: DiagnosticsConfig,

    /// Deferral tables
    pub policy: PolicyConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Classification severity settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    /// Treat requests for unknown components as fatal
    pub strict: bool,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Periodic reporter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Start the background reporter at all
    pub enabled: bool,

    /// Uptime below which the reporter stays quiet
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,

    /// Time between reports
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            grace_period: DEFAULT_GRACE_PERIOD,
            interval: DEFAULT_REPORT_INTERVAL,
        }
    }
}

/// Failure buffer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Buffer size in bytes
    pub buffer_capacity: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Deferral tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Components whose initializers wait for a load request
    pub eligible: Vec<String>,

    /// Components that are never deferred
    pub ignored: Vec<String>,

    /// Components that run once every eligible component has been loaded
    pub deferred: Vec<String>,

    /// Components built in without a deferred initializer
    pub builtin: Vec<String>,
}

impl PolicyConfig {
    /// Whether no table names anything
    pub fn is_empty(&self) -> bool {
        self.eligible.is_empty()
            && self.ignored.is_empty()
            && self.deferred.is_empty()
            && self.builtin.is_empty()
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// One configuration file; `None` marks a key the file leaves out
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    mode: ModeLayer,
    reporter: ReporterLayer,
    diagnostics: DiagnosticsLayer,
    policy: PolicyLayer,
    logging: LoggingLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModeLayer {
    strict: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReporterLayer {
    enabled: Option<bool>,
    #[serde(with = "humantime_serde")]
    grace_period: Option<Duration>,
    #[serde(with = "humantime_serde")]
    interval: Option<Duration>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DiagnosticsLayer {
    buffer_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PolicyLayer {
    eligible: Option<Vec<String>>,
    ignored: Option<Vec<String>>,
    deferred: Option<Vec<String>>,
    builtin: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggingLayer {
    log_level: Option<String>,
}

/// Read a TOML, YAML or JSON document, choosing the format by extension
pub fn read_document<T: DeserializeOwned>(path: &Path) -> crate::error::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let document = match extension {
        "yml" | "yaml" => serde_yaml::from_str(&content)?,
        "json" => serde_json::from_str(&content)?,
        _ => toml::from_str(&content)?,
    };
    Ok(document)
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::from_layers(&Self::get_config_paths(config_path))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Merge every existing file in `paths`, in order
    ///
    /// A later file only overrides the keys it actually sets.
    pub fn from_layers(paths: &[PathBuf]) -> Result<Self> {
        let mut config = Config::default();
        for path in paths {
            if path.exists() {
                config = config.merge_from_file(path)?;
            }
        }
        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(env_config) = std::env::var("LAZYINIT_CONFIG") {
            paths.push(PathBuf::from(env_config));
            return paths;
        }

        if let Some(path) = explicit_path {
            paths.push(path.clone());
            return paths;
        }

        paths.push(PathBuf::from("/etc/lazyinit/lazyinit.toml"));

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".lazyinit.toml"));
        }

        paths.push(PathBuf::from("lazyinit.toml"));

        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let layer: ConfigLayer = read_document(path)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(self.merge(layer))
    }

    /// Merge one file layer into this config
    fn merge(&self, layer: ConfigLayer) -> Config {
        let base = self.clone();
        Config {
            mode: ModeConfig {
                strict: layer.mode.strict.unwrap_or(base.mode.strict),
            },
            reporter: ReporterConfig {
                enabled: layer.reporter.enabled.unwrap_or(base.reporter.enabled),
                grace_period: layer
                    .reporter
                    .grace_period
                    .unwrap_or(base.reporter.grace_period),
                interval: layer.reporter.interval.unwrap_or(base.reporter.interval),
            },
            diagnostics: DiagnosticsConfig {
                buffer_capacity: layer
                    .diagnostics
                    .buffer_capacity
                    .unwrap_or(base.diagnostics.buffer_capacity),
            },
            policy: PolicyConfig {
                eligible: layer.policy.eligible.unwrap_or(base.policy.eligible),
                ignored: layer.policy.ignored.unwrap_or(base.policy.ignored),
                deferred: layer.policy.deferred.unwrap_or(base.policy.deferred),
                builtin: layer.policy.builtin.unwrap_or(base.policy.builtin),
            },
            logging: LoggingConfig {
                log_level: layer.logging.log_level.unwrap_or(base.logging.log_level),
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // LAZYINIT_STRICT
        if let Ok(strict) = std::env::var("LAZYINIT_STRICT") {
            match strict.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.mode.strict = true,
                "0" | "false" | "no" | "off" => self.mode.strict = false,
                other => tracing::warn!("ignoring LAZYINIT_STRICT={}", other),
            }
        }

        // LAZYINIT_GRACE_SECS
        if let Ok(grace) = std::env::var("LAZYINIT_GRACE_SECS") {
            if let Ok(secs) = grace.parse() {
                self.reporter.grace_period = Duration::from_secs(secs);
            }
        }

        // LAZYINIT_INTERVAL_SECS
        if let Ok(interval) = std::env::var("LAZYINIT_INTERVAL_SECS") {
            if let Ok(secs) = interval.parse() {
                self.reporter.interval = Duration::from_secs(secs);
            }
        }

        // LAZYINIT_LOG_LEVEL
        if let Ok(level) = std::env::var("LAZYINIT_LOG_LEVEL") {
            self.logging.log_level = level;
        }
    }

    /// Classification severity
    pub fn mode(&self) -> ClassificationMode {
        if self.mode.strict {
            ClassificationMode::Strict
        } else {
            ClassificationMode::Permissive
        }
    }

    /// Build policy tables from the `policy` section
    pub fn to_policy(&self) -> PolicyTables {
        PolicyTables::builder()
            .eligible(self.policy.eligible.iter().cloned())
            .ignored(self.policy.ignored.iter().cloned())
            .deferred(self.policy.deferred.iter().cloned())
            .builtin(self.policy.builtin.iter().cloned())
            .build()
    }

    /// Check values that cannot be expressed through types alone
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.reporter.enabled && self.reporter.interval.is_zero() {
            return Err(crate::error::Error::invalid_config(
                "reporter.interval",
                "must be greater than zero",
            ));
        }
        self.to_policy().validate()
    }

    /// Load from a specific file only, without env overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}
