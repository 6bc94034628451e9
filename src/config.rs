//! Compiler options loaded from TOML configuration
//!
//! Options control the small set of dialect knobs the expansion engine
//! honors: the index base for `tag[n]` selectors, the inheritance depth
//! limit, and whether missing delete targets warn.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading or parsing a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse configuration TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Options honored by the expansion engine
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Optional configuration name
    pub name: Option<String>,
    /// Optional description
    pub description: Option<String>,
    /// First value of `tag[n]` selectors; 0 unless a dialect says otherwise
    pub index_base: usize,
    /// Maximum inheritance chain length before resolution aborts
    pub max_inheritance_depth: usize,
    /// Warn when an un-indexed delete matches nothing
    pub warn_missing_delete_target: bool,
}

/// TOML structure for deserializing options
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TomlOptions {
    metadata: Option<TomlMetadata>,
    index_base: Option<usize>,
    max_inheritance_depth: Option<usize>,
    warn_missing_delete_target: Option<bool>,
}

#[derive(Deserialize)]
struct TomlMetadata {
    name: Option<String>,
    description: Option<String>,
}

/// Default option document
const DEFAULT_OPTIONS: &str = r#"
index-base = 0
max-inheritance-depth = 64
warn-missing-delete-target = true
"#;

impl CompilerOptions {
    /// Load options from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load options from a TOML string
    ///
    /// Omitted keys fall back to the embedded defaults.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlOptions = toml::from_str(content)?;
        let defaults = Self::default();

        Ok(CompilerOptions {
            name: parsed.metadata.as_ref().and_then(|m| m.name.clone()),
            description: parsed.metadata.as_ref().and_then(|m| m.description.clone()),
            index_base: parsed.index_base.unwrap_or(defaults.index_base),
            max_inheritance_depth: parsed
                .max_inheritance_depth
                .unwrap_or(defaults.max_inheritance_depth),
            warn_missing_delete_target: parsed
                .warn_missing_delete_target
                .unwrap_or(defaults.warn_missing_delete_target),
        })
    }
}

impl Default for CompilerOptions {
    fn default() -> Self {
        let parsed: TomlOptions =
            toml::from_str(DEFAULT_OPTIONS).unwrap_or_else(|_| TomlOptions {
                metadata: None,
                index_base: None,
                max_inheritance_depth: None,
                warn_missing_delete_target: None,
            });
        CompilerOptions {
            name: None,
            description: None,
            index_base: parsed.index_base.unwrap_or(0),
            max_inheritance_depth: parsed.max_inheritance_depth.unwrap_or(64),
            warn_missing_delete_target: parsed.warn_missing_delete_target.unwrap_or(true),
        }
    }
}
