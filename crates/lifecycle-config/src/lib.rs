//! Configuration module for the order lifecycle service.
//!
//! Configuration is loaded from TOML files. String values may reference
//! environment variables as `${VAR}` or `${VAR:-default}`.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(any(test, feature = "testing"))]
pub mod builders {
	pub mod config;
}
mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep only the message, not the input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the lifecycle service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Configuration for the order storage backend.
	pub storage: StorageConfig,
	/// Tuning for event dispatch.
	#[serde(default)]
	pub lifecycle: LifecycleConfig,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this instance, used in log output.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Dispatch tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifecycleConfig {
	/// Upper bound on dispatches running at the same time.
	#[serde(default = "default_max_concurrent_dispatches")]
	pub max_concurrent_dispatches: usize,
	/// Capacity of the broadcast channel carrying status notifications.
	#[serde(default = "default_event_bus_capacity")]
	pub event_bus_capacity: usize,
	/// Capacity of the inbound event queue.
	#[serde(default = "default_inbound_buffer")]
	pub inbound_buffer: usize,
}

impl Default for LifecycleConfig {
	fn default() -> Self {
		Self {
			max_concurrent_dispatches: default_max_concurrent_dispatches(),
			event_bus_capacity: default_event_bus_capacity(),
			inbound_buffer: default_inbound_buffer(),
		}
	}
}

fn default_max_concurrent_dispatches() -> usize {
	100
}

fn default_event_bus_capacity() -> usize {
	1000
}

fn default_inbound_buffer() -> usize {
	1024
}

const MAX_CONCURRENT_DISPATCHES: usize = 10_000;

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration.
	///
	/// - Ensures the service ID is not empty
	/// - Checks that the primary storage implementation is configured
	/// - Checks dispatch tuning values are within range
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		let lifecycle = &self.lifecycle;
		if lifecycle.max_concurrent_dispatches == 0
			|| lifecycle.max_concurrent_dispatches > MAX_CONCURRENT_DISPATCHES
		{
			return Err(ConfigError::Validation(format!(
				"lifecycle.max_concurrent_dispatches must be between 1 and {}",
				MAX_CONCURRENT_DISPATCHES
			)));
		}
		if lifecycle.event_bus_capacity == 0 {
			return Err(ConfigError::Validation(
				"lifecycle.event_bus_capacity must be greater than 0".into(),
			));
		}
		if lifecycle.inbound_buffer == 0 {
			return Err(ConfigError::Validation(
				"lifecycle.inbound_buffer must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[service]
id = "orders-test"

[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("LIFECYCLE_TEST_HOST", "localhost");
		std::env::set_var("LIFECYCLE_TEST_PORT", "5432");

		let input = "host = \"${LIFECYCLE_TEST_HOST}:${LIFECYCLE_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("LIFECYCLE_TEST_HOST");
		std::env::remove_var("LIFECYCLE_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${LIFECYCLE_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${LIFECYCLE_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.unwrap_err().to_string().contains("LIFECYCLE_MISSING_VAR"));
	}

	#[test]
	fn test_minimal_config_uses_lifecycle_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.service.id, "orders-test");
		assert_eq!(config.storage.primary, "memory");
		assert_eq!(config.lifecycle.max_concurrent_dispatches, 100);
		assert_eq!(config.lifecycle.event_bus_capacity, 1000);
		assert_eq!(config.lifecycle.inbound_buffer, 1024);
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("LIFECYCLE_TEST_SERVICE_ID", "from-env");

		let config_str = r#"
[service]
id = "${LIFECYCLE_TEST_SERVICE_ID}"

[storage]
primary = "file"
[storage.implementations.file]
storage_path = "${LIFECYCLE_TEST_DATA_DIR:-./data/orders}"

[lifecycle]
max_concurrent_dispatches = 8
"#;

		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.service.id, "from-env");
		assert_eq!(config.lifecycle.max_concurrent_dispatches, 8);
		assert_eq!(
			config.storage.implementations["file"]
				.get("storage_path")
				.and_then(|v| v.as_str()),
			Some("./data/orders")
		);

		std::env::remove_var("LIFECYCLE_TEST_SERVICE_ID");
	}

	#[test]
	fn test_primary_storage_must_be_configured() {
		let config_str = r#"
[service]
id = "orders-test"

[storage]
primary = "file"
[storage.implementations.memory]
"#;
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Primary storage 'file'"));
	}

	#[test]
	fn test_dispatch_limit_out_of_range() {
		let config_str = format!("{}\n[lifecycle]\nmax_concurrent_dispatches = 0\n", MINIMAL);
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn test_empty_service_id_rejected() {
		let config_str = MINIMAL.replace("orders-test", "");
		assert!(config_str.parse::<Config>().is_err());
	}
}
