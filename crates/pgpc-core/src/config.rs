use crate::error::{PgpcError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Set programmatically by the embedding application
    Override,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Override => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for patch sizing
#[derive(Debug, Clone)]
pub struct SizingConfig {
    /// Target maximum number of points in one patch
    pub max_points_per_patch: ConfigValue<u64>,
    /// Cell size used when the extent is too small to grid
    pub fallback_patch_size: ConfigValue<i64>,
    /// The first guess is the larger extent side divided by this
    pub initial_divisor: ConfigValue<u32>,
    /// Unit steps with no crowded cells tolerated before accepting
    pub long_tail_limit: ConfigValue<u32>,
    pub max_iterations: ConfigValue<u32>,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SizingConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            max_points_per_patch: ConfigValue::new(400, ConfigSource::Default),
            fallback_patch_size: ConfigValue::new(100, ConfigSource::Default),
            initial_divisor: ConfigValue::new(10, ConfigSource::Default),
            long_tail_limit: ConfigValue::new(5, ConfigSource::Default),
            max_iterations: ConfigValue::new(1000, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| PgpcError::ConfigInvalid {
            key: "file".to_string(),
            reason: format!("Failed to read config file: {}", e),
        })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| PgpcError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(max_points) = file_config.max_points_per_patch {
            self.max_points_per_patch.update(max_points, ConfigSource::File);
        }

        if let Some(fallback) = file_config.fallback_patch_size {
            self.fallback_patch_size.update(fallback, ConfigSource::File);
        }

        if let Some(divisor) = file_config.initial_divisor {
            self.initial_divisor.update(divisor, ConfigSource::File);
        }

        if let Some(limit) = file_config.long_tail_limit {
            self.long_tail_limit.update(limit, ConfigSource::File);
        }

        if let Some(max_iterations) = file_config.max_iterations {
            self.max_iterations.update(max_iterations, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // PGPC_MAX_POINTS_PER_PATCH
        if let Some(max_points) = parse_env::<u64>("PGPC_MAX_POINTS_PER_PATCH") {
            self.max_points_per_patch.update(max_points, ConfigSource::Environment);
        }

        // PGPC_FALLBACK_PATCH_SIZE
        if let Some(fallback) = parse_env::<i64>("PGPC_FALLBACK_PATCH_SIZE") {
            self.fallback_patch_size.update(fallback, ConfigSource::Environment);
        }

        // PGPC_INITIAL_DIVISOR
        if let Some(divisor) = parse_env::<u32>("PGPC_INITIAL_DIVISOR") {
            self.initial_divisor.update(divisor, ConfigSource::Environment);
        }

        // PGPC_LONG_TAIL_LIMIT
        if let Some(limit) = parse_env::<u32>("PGPC_LONG_TAIL_LIMIT") {
            self.long_tail_limit.update(limit, ConfigSource::Environment);
        }

        // PGPC_MAX_ITERATIONS
        if let Some(max_iterations) = parse_env::<u32>("PGPC_MAX_ITERATIONS") {
            self.max_iterations.update(max_iterations, ConfigSource::Environment);
        }

        self
    }

    /// Apply programmatic overrides
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(max_points) = overrides.max_points_per_patch {
            self.max_points_per_patch.update(max_points, ConfigSource::Override);
        }

        if let Some(fallback) = overrides.fallback_patch_size {
            self.fallback_patch_size.update(fallback, ConfigSource::Override);
        }

        if let Some(divisor) = overrides.initial_divisor {
            self.initial_divisor.update(divisor, ConfigSource::Override);
        }

        if let Some(limit) = overrides.long_tail_limit {
            self.long_tail_limit.update(limit, ConfigSource::Override);
        }

        if let Some(max_iterations) = overrides.max_iterations {
            self.max_iterations.update(max_iterations, ConfigSource::Override);
        }
    }

    /// Reject values the grid sizer cannot work with
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, reason: &str| PgpcError::ConfigInvalid {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if self.max_points_per_patch.value == 0 {
            return Err(invalid("max_points_per_patch", "must be greater than zero"));
        }
        if self.fallback_patch_size.value < 1 {
            return Err(invalid("fallback_patch_size", "must be at least 1"));
        }
        if self.initial_divisor.value == 0 {
            return Err(invalid("initial_divisor", "must be greater than zero"));
        }
        if self.max_iterations.value == 0 {
            return Err(invalid("max_iterations", "must be greater than zero"));
        }
        Ok(())
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "max_points_per_patch".to_string(),
            (self.max_points_per_patch.value.to_string(), self.max_points_per_patch.source),
        );

        map.insert(
            "fallback_patch_size".to_string(),
            (self.fallback_patch_size.value.to_string(), self.fallback_patch_size.source),
        );

        map.insert(
            "initial_divisor".to_string(),
            (self.initial_divisor.value.to_string(), self.initial_divisor.source),
        );

        map.insert(
            "long_tail_limit".to_string(),
            (self.long_tail_limit.value.to_string(), self.long_tail_limit.source),
        );

        map.insert(
            "max_iterations".to_string(),
            (self.max_iterations.value.to_string(), self.max_iterations.source),
        );

        map
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} value '{}': expected an integer", key, raw);
            None
        }
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    max_points_per_patch: Option<u64>,
    fallback_patch_size: Option<i64>,
    initial_divisor: Option<u32>,
    long_tail_limit: Option<u32>,
    max_iterations: Option<u32>,
}

/// Programmatic configuration overrides
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub max_points_per_patch: Option<u64>,
    pub fallback_patch_size: Option<i64>,
    pub initial_divisor: Option<u32>,
    pub long_tail_limit: Option<u32>,
    pub max_iterations: Option<u32>,
}
