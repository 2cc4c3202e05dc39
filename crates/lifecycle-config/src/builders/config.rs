//! Configuration builder for tests and development setups.

use crate::{Config, LifecycleConfig, ServiceConfig, StorageConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to an in-memory store and the standard dispatch limits.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	storage_primary: String,
	storage_implementations: HashMap<String, toml::Value>,
	lifecycle: LifecycleConfig,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let mut storage_implementations = HashMap::new();
		storage_implementations.insert(
			"memory".to_string(),
			toml::Value::Table(toml::map::Map::new()),
		);

		Self {
			service_id: "test-lifecycle".to_string(),
			storage_primary: "memory".to_string(),
			storage_implementations,
			lifecycle: LifecycleConfig::default(),
		}
	}

	/// Adds a storage implementation and makes it primary.
	pub fn storage(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		let name = name.into();
		self.storage_implementations.insert(name.clone(), config);
		self.storage_primary = name;
		self
	}

	pub fn max_concurrent_dispatches(mut self, limit: usize) -> Self {
		self.lifecycle.max_concurrent_dispatches = limit;
		self
	}

	pub fn build(self) -> Config {
		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: self.storage_implementations,
			},
			lifecycle: self.lifecycle,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_pass_validation() {
		let config = ConfigBuilder::new().build();
		assert!(config.validate().is_ok());
		assert_eq!(config.storage.primary, "memory");
	}

	#[test]
	fn test_storage_override_becomes_primary() {
		let config = ConfigBuilder::new()
			.storage("file", toml::Value::Table(toml::map::Map::new()))
			.max_concurrent_dispatches(2)
			.build();
		assert_eq!(config.storage.primary, "file");
		assert_eq!(config.storage.implementations.len(), 2);
		assert_eq!(config.lifecycle.max_concurrent_dispatches, 2);
	}
}
