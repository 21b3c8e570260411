// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bridge configuration.
//!
//! Loaded from built-in defaults, then the global `tether/config.toml` in
//! the platform config directory, then an explicit file. Each layer only
//! overrides the keys it sets.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the log filter
pub const LOG_ENV: &str = "TETHER_LOG";

/// Configuration for the bridge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Document loading
    pub modules: ModuleConfig,
    /// Value marshaling
    pub marshal: MarshalConfig,
    /// Logging
    pub logging: LoggingConfig,
}

/// `[modules]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Directories searched for bare specifiers
    pub search_path: Vec<PathBuf>,
    /// Extensions tried when a specifier has none
    pub extensions: Vec<String>,
    /// Whether documents may be read from the file system
    pub allow_file_loading: bool,
    /// Maximum number of cached document contents
    pub max_cache_size: usize,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            search_path: Vec::new(),
            extensions: vec![".js".into(), ".mjs".into(), ".json".into()],
            allow_file_loading: true,
            max_cache_size: 1024,
        }
    }
}

/// `[marshal]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarshalConfig {
    /// Maximum nesting depth of marshaled values
    pub max_depth: usize,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            max_depth: crate::engine::DEFAULT_MAX_MARSHAL_DEPTH,
        }
    }
}

/// `[logging]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "tether_bridge=info".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from the default locations, then `explicit`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = BridgeConfig::default();

        if let Some(path) = global_config_path() {
            if path.exists() {
                config.merge_from_file(&path)?;
            }
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(BridgeError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            config.merge_from_file(path)?;
        }

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a single TOML document over the defaults.
    pub fn from_toml(source: &str) -> Result<Self> {
        let mut config = BridgeConfig::default();
        config.merge_toml(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge configuration from a file.
    fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        tracing::debug!(path = %path.display(), "loading bridge config");
        let content = std::fs::read_to_string(path)?;
        self.merge_toml(&content)
    }

    /// Merge a TOML document, overriding only the keys it sets.
    fn merge_toml(&mut self, source: &str) -> Result<()> {
        let layer: ConfigLayer = toml::from_str(source)?;

        if let Some(modules) = layer.modules {
            if let Some(v) = modules.search_path {
                self.modules.search_path = v;
            }
            if let Some(v) = modules.extensions {
                self.modules.extensions = v;
            }
            if let Some(v) = modules.allow_file_loading {
                self.modules.allow_file_loading = v;
            }
            if let Some(v) = modules.max_cache_size {
                self.modules.max_cache_size = v;
            }
        }
        if let Some(v) = layer.marshal.and_then(|m| m.max_depth) {
            self.marshal.max_depth = v;
        }
        if let Some(v) = layer.logging.and_then(|l| l.filter) {
            self.logging.filter = v;
        }
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Ok(filter) = std::env::var(LOG_ENV) {
            if !filter.trim().is_empty() {
                self.logging.filter = filter;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.marshal.max_depth == 0 {
            return Err(BridgeError::Config("marshal.max_depth must be positive".into()));
        }
        if let Some(ext) = self.modules.extensions.iter().find(|e| !e.starts_with('.')) {
            return Err(BridgeError::Config(format!(
                "module extension '{}' must start with '.'",
                ext
            )));
        }
        Ok(())
    }
}

/// Get the global config path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tether").join("config.toml"))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    modules: Option<ModuleLayer>,
    marshal: Option<MarshalLayer>,
    logging: Option<LoggingLayer>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleLayer {
    search_path: Option<Vec<PathBuf>>,
    extensions: Option<Vec<String>>,
    allow_file_loading: Option<bool>,
    max_cache_size: Option<usize>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MarshalLayer {
    max_depth: Option<usize>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingLayer {
    filter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.modules.extensions, vec![".js", ".mjs", ".json"]);
        assert!(config.modules.allow_file_loading);
        assert_eq!(config.modules.max_cache_size, 1024);
        assert_eq!(config.marshal.max_depth, 64);
        assert_eq!(config.logging.filter, "tether_bridge=info");
    }

    #[test]
    fn test_partial_override() {
        let config = BridgeConfig::from_toml(
            r#"
            [modules]
            allow_file_loading = false

            [marshal]
            max_depth = 8
            "#,
        )
        .unwrap();
        assert!(!config.modules.allow_file_loading);
        assert_eq!(config.modules.max_cache_size, 1024);
        assert_eq!(config.marshal.max_depth, 8);
    }

    #[test]
    fn test_layers_merge() {
        let mut config = BridgeConfig::default();
        config.merge_toml("[modules]\nmax_cache_size = 2").unwrap();
        config.merge_toml("[logging]\nfilter = \"debug\"").unwrap();
        assert_eq!(config.modules.max_cache_size, 2);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = BridgeConfig::from_toml("[modules]\nmax_cache = 3").unwrap_err();
        assert!(matches!(err, BridgeError::Toml(_)));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            BridgeConfig::from_toml("[marshal]\nmax_depth = 0"),
            Err(BridgeError::Config(_))
        ));
        assert!(matches!(
            BridgeConfig::from_toml("[modules]\nextensions = [\"js\"]"),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tether.toml");
        std::fs::write(&path, "[modules]\nsearch_path = [\"lib\"]\n").unwrap();

        let config = BridgeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.modules.search_path, vec![PathBuf::from("lib")]);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = BridgeConfig::load(Some(Path::new("/nonexistent/tether.toml"))).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
