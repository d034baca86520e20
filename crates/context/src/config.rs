//! Bridge configuration via `bridge.toml`
//!
//! Qualifier-style wiring (which transaction is "the default", which flush
//! mode a scope starts in) is expressed as named keys in one config file.
//! A missing file or missing keys fall back to the defaults below.

use crate::controller::RenderPolicy;
use bridge_core::{BridgeError, BridgeResult, FlushModeType, DEFAULT_TRANSACTION};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed in the application's config directory.
pub const CONFIG_FILE_NAME: &str = "bridge.toml";

/// Bridge configuration loaded from `bridge.toml`.
///
/// # Example
///
/// ```toml
/// default_flush_mode = "auto"
/// render_policy = "passthrough"
/// default_transaction = "default"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Baseline flush mode of a new scope, until a session reports its own.
    #[serde(default)]
    pub default_flush_mode: FlushModeType,
    /// Behaviour of `before_render`.
    #[serde(default)]
    pub render_policy: RenderPolicy,
    /// Transaction registry key resolved by `default_transaction()`.
    #[serde(default = "default_transaction_name")]
    pub default_transaction: String,
}

fn default_transaction_name() -> String {
    DEFAULT_TRANSACTION.to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_flush_mode: FlushModeType::default(),
            render_policy: RenderPolicy::default(),
            default_transaction: default_transaction_name(),
        }
    }
}

impl BridgeConfig {
    /// Set the baseline flush mode (builder pattern).
    pub fn with_default_flush_mode(mut self, mode: FlushModeType) -> Self {
        self.default_flush_mode = mode;
        self
    }

    /// Set the render policy (builder pattern).
    pub fn with_render_policy(mut self, policy: RenderPolicy) -> Self {
        self.render_policy = policy;
        self
    }

    /// Set the default transaction key (builder pattern).
    pub fn with_default_transaction(mut self, name: impl Into<String>) -> Self {
        self.default_transaction = name.into();
        self
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the default transaction key is blank.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.default_transaction.trim().is_empty() {
            return Err(BridgeError::config(
                "default_transaction must name a registered transaction",
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Persistence bridge configuration
#
# Baseline flush mode of a new scope: "auto" (default), "commit", "manual", "always".
# A session opened by the scope replaces it with the engine's own default
# unless the scope already changed the mode.
default_flush_mode = "auto"

# What happens right before rendering:
#   "passthrough"          = render under the current mode (default)
#   "manual_during_render" = render under "manual", restored after rendering
render_policy = "passthrough"

# Transaction registry key used when application code does not name one.
default_transaction = "default"
"#
    }

    /// Parse and validate config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed or fails validation.
    pub fn from_toml_str(content: &str) -> BridgeResult<Self> {
        let config: BridgeConfig = toml::from_str(content)
            .map_err(|e| BridgeError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> BridgeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            BridgeError::Config { message } => {
                BridgeError::config(format!("{} ({})", message, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> BridgeResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                BridgeError::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> BridgeResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BridgeError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            BridgeError::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
