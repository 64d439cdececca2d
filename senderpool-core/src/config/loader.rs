//! # Configuration Loading
//!
//! Layers defaults, an optional TOML file and `SENDERPOOL_*` environment
//! variables, then validates the result.
//!
//! Environment keys use a double underscore between the section and the
//! field, so `SENDERPOOL_POOL__INIT_TIMEOUT_MS=5000` sets
//! `pool.init_timeout_ms`.

use crate::{
    config::{schema::SenderPoolConfig, validator::ConfigValidator},
    Error, Result,
};
use std::{
    env,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

const CONFIG_FILE_NAMES: [&str; 2] = ["senderpool.toml", "config.toml"];

/// Configuration loader with support for multiple sources
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
    explicit_file: Option<PathBuf>,
    env_prefix: String,
    env_vars: Option<Vec<(String, String)>>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = vec![PathBuf::from("."), PathBuf::from("./config")];
        if let Some(dir) = dirs::config_dir() {
            search_paths.push(dir.join("senderpool"));
        }

        Self { search_paths, explicit_file: None, env_prefix: "SENDERPOOL".to_string(), env_vars: None }
    }

    /// Add a search path for configuration files
    #[must_use]
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Load this file instead of searching; it must exist
    #[must_use]
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.explicit_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix
    #[must_use]
    pub fn with_env_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.as_ref().to_string();
        self
    }

    /// Read overrides from these pairs instead of the process environment
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Load configuration from all available sources
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] when a file cannot be read or parsed,
    /// or when the merged configuration fails validation.
    pub fn load(&self) -> Result<SenderPoolConfig> {
        info!("Loading configuration");

        let mut config_value = toml::Value::try_from(SenderPoolConfig::default())?;

        if let Some(config_path) = self.find_config_file()? {
            let file_config = Self::read_file(&config_path)?;
            config_value = Self::merge(config_value, file_config);
            info!("Loaded configuration file: {}", config_path.display());
        } else {
            debug!("No configuration file found in search paths");
        }

        config_value = self.apply_env_vars(config_value);

        let config: SenderPoolConfig = config_value.try_into()?;
        ConfigValidator::validate(&config)?;

        info!(topic = %config.pool.topic, capacity = config.pool.capacity, "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from a single file, without defaults for the
    /// required `pool` section and without environment overrides
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] on I/O, parse or validation failure.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<SenderPoolConfig> {
        let path = path.as_ref();
        info!("Loading configuration from file: {}", path.display());

        let config: SenderPoolConfig = Self::read_file(path)?.try_into()?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Parse and validate configuration held in a string
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] on parse or validation failure.
    pub fn load_from_str(content: &str) -> Result<SenderPoolConfig> {
        let config: SenderPoolConfig = toml::from_str(content)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] on serialization or I/O failure.
    pub fn save_to_file<P: AsRef<Path>>(config: &SenderPoolConfig, path: P) -> Result<()> {
        let toml_string = toml::to_string_pretty(config)?;

        std::fs::write(path.as_ref(), toml_string).map_err(|e| {
            Error::Configuration(format!(
                "Failed to write config to {}: {e}",
                path.as_ref().display()
            ))
        })?;

        info!("Configuration saved to: {}", path.as_ref().display());
        Ok(())
    }

    /// Get the search paths being used
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Get the environment prefix being used
    #[must_use]
    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    fn find_config_file(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.explicit_file {
            if !path.exists() {
                return Err(Error::Configuration(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
            return Ok(Some(path.clone()));
        }

        for search_path in &self.search_paths {
            for name in CONFIG_FILE_NAMES {
                let candidate = search_path.join(name);
                if candidate.exists() {
                    debug!("Found config file: {}", candidate.display());
                    return Ok(Some(candidate));
                }
            }
        }

        Ok(None)
    }

    fn read_file(path: &Path) -> Result<toml::Value> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        content.parse::<toml::Value>().map_err(|e| {
            Error::Configuration(format!("Failed to parse config file {}: {e}", path.display()))
        })
    }

    /// Recursively overlay `overlay` onto `base`; tables merge, everything
    /// else replaces.
    fn merge(mut base: toml::Value, overlay: toml::Value) -> toml::Value {
        match (&mut base, overlay) {
            (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
                for (key, value) in overlay_table {
                    match base_table.remove(&key) {
                        Some(existing) if existing.is_table() && value.is_table() => {
                            base_table.insert(key, Self::merge(existing, value));
                        },
                        _ => {
                            base_table.insert(key, value);
                        },
                    }
                }
                base
            },
            (_, overlay) => overlay,
        }
    }

    fn apply_env_vars(&self, mut config: toml::Value) -> toml::Value {
        let prefix = format!("{}_", self.env_prefix);
        let vars = self.env_vars.clone().unwrap_or_else(|| env::vars().collect());

        let mut applied = 0usize;
        for (key, value) in vars {
            let Some(stripped) = key.strip_prefix(&prefix) else {
                continue;
            };
            let path: Vec<String> = stripped.split("__").map(str::to_lowercase).collect();
            if path.iter().any(String::is_empty) {
                debug!("Ignoring malformed override {key}");
                continue;
            }
            Self::set_nested(&mut config, &path, Self::parse_env_value(&value));
            applied += 1;
        }

        debug!("Applied {applied} environment overrides");
        config
    }

    fn set_nested(config: &mut toml::Value, path: &[String], value: toml::Value) {
        let toml::Value::Table(table) = config else {
            return;
        };

        match path {
            [] => {},
            [leaf] => {
                table.insert(leaf.clone(), value);
            },
            [head, rest @ ..] => {
                let entry = table
                    .entry(head.clone())
                    .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
                Self::set_nested(entry, rest, value);
            },
        }
    }

    fn parse_env_value(value: &str) -> toml::Value {
        if let Ok(bool_val) = value.parse::<bool>() {
            return toml::Value::Boolean(bool_val);
        }

        if let Ok(int_val) = value.parse::<i64>() {
            return toml::Value::Integer(int_val);
        }

        toml::Value::String(value.to_string())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
