//! Handler configuration
//!
//! Configuration arrives as one or two blobs keyed by message type:
//! a primary handler config and an optional project handler config.
//! Keys may use hyphens or underscores; they are normalized to underscores.
//!
//! ```json
//! { "create-issue": { "max": 2, "blocked": ["wontfix"] },
//!   "update_project": { "max": 5 } }
//! ```
//!
//! Blobs are read from `.json` or `.toml` files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{normalize_type_key, MessageType};

/// Message types whose handlers take the project configuration bucket
pub const PROJECT_MESSAGE_TYPES: &[&str] = &[
    "create_project",
    "update_project",
    "create_project_status_update",
    "copy_project",
];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("No handler configuration supplied: expected a handler config, a project handler config, or both")]
    Missing,

    #[error("Invalid {blob} configuration: {reason}")]
    Invalid { blob: &'static str, reason: String },

    #[error("'{0}' is not a project message type and cannot appear in the project handler configuration")]
    NotProjectType(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Per-type handler configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Maximum number of messages this handler processes per dispatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,

    /// Values the handler accepts (empty means any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,

    /// Values the handler refuses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked: Vec<String>,

    /// Default target (e.g., a repository or a project URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Handler-specific settings
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Handler configuration split into regular and project buckets
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartitionedConfig {
    pub regular: BTreeMap<String, HandlerConfig>,
    pub project: BTreeMap<String, HandlerConfig>,
}

impl PartitionedConfig {
    /// Returns the configuration for a message type, from the right bucket
    pub fn get(&self, message_type: MessageType) -> Option<&HandlerConfig> {
        self.regular
            .get(message_type.as_str())
            .or_else(|| self.project.get(message_type.as_str()))
    }

    /// Iterates over every configured key with its config
    pub fn iter(&self) -> impl Iterator<Item = (&String, &HandlerConfig)> {
        self.regular.iter().chain(self.project.iter())
    }

    /// Returns true if no handler is configured
    pub fn is_empty(&self) -> bool {
        self.regular.is_empty() && self.project.is_empty()
    }
}

/// Returns true if the (normalized) key names a project message type
pub fn is_project_type(key: &str) -> bool {
    PROJECT_MESSAGE_TYPES.contains(&key)
}

/// Splits configuration blobs into regular and project buckets
///
/// Project-type keys in the primary blob move to the project bucket; a key
/// present in the project blob always overrides the auto-split value.
/// Fails with [`ConfigError::Missing`] when both blobs are absent.
pub fn partition(
    primary: Option<&Value>,
    project: Option<&Value>,
) -> Result<PartitionedConfig, ConfigError> {
    if primary.is_none() && project.is_none() {
        return Err(ConfigError::Missing);
    }

    let mut config = PartitionedConfig::default();

    if let Some(blob) = primary {
        for (key, handler) in parse_blob(blob, "handler")? {
            if is_project_type(&key) {
                config.project.insert(key, handler);
            } else {
                config.regular.insert(key, handler);
            }
        }
    }

    if let Some(blob) = project {
        for (key, handler) in parse_blob(blob, "project handler")? {
            if !is_project_type(&key) {
                return Err(ConfigError::NotProjectType(key));
            }
            config.project.insert(key, handler);
        }
    }

    Ok(config)
}

/// Parses one blob into normalized keys and handler configs
fn parse_blob(
    blob: &Value,
    name: &'static str,
) -> Result<Vec<(String, HandlerConfig)>, ConfigError> {
    let object = blob.as_object().ok_or_else(|| ConfigError::Invalid {
        blob: name,
        reason: "expected an object keyed by message type".to_string(),
    })?;

    object
        .iter()
        .map(|(key, value)| -> Result<(String, HandlerConfig), ConfigError> {
            let handler = match value {
                Value::Null => HandlerConfig::default(),
                Value::Object(_) => serde_json::from_value(value.clone()).map_err(|e| {
                    ConfigError::Invalid {
                        blob: name,
                        reason: format!("'{}': {}", key, e),
                    }
                })?,
                other => {
                    return Err(ConfigError::Invalid {
                        blob: name,
                        reason: format!("'{}': expected an object, got {}", key, other),
                    })
                }
            };
            Ok((normalize_type_key(key), handler))
        })
        .collect()
}

/// Loads a configuration blob from a `.json` or `.toml` file
pub fn load_config_file(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;

    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    if is_toml {
        let parsed: toml::Value = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        serde_json::to_value(parsed).context("Failed to convert TOML config")
    } else {
        serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }
}
