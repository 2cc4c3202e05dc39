//! Builder for assembling a lifecycle engine from configuration.
//!
//! Storage backends are supplied as factory functions keyed by implementation
//! name, so the binary decides which backends are compiled in and the
//! configuration decides which one is used.

use crate::engine::{event_bus::EventBus, LifecycleEngine};
use crate::manager::OrderLifecycleManager;
use crate::state::OrderStore;
use lifecycle_config::Config;
use lifecycle_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while building the engine.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions available to the builder.
pub struct LifecycleFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

/// Builds a [`LifecycleEngine`] with a pluggable storage backend.
pub struct LifecycleBuilder {
	config: Config,
}

impl LifecycleBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub async fn build<SF>(
		self,
		factories: LifecycleFactories<SF>,
	) -> Result<LifecycleEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(
					component = "storage",
					implementation = %name,
					"No factory registered, skipping"
				);
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					storage_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::MissingComponent(
				"No valid storage implementations available".into(),
			));
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;

		let storage = Arc::new(StorageService::new(storage_backend));
		let store = Arc::new(OrderStore::new(storage));
		let event_bus = EventBus::new(self.config.lifecycle.event_bus_capacity);
		let manager = Arc::new(OrderLifecycleManager::new(store, event_bus.clone()));

		Ok(LifecycleEngine::new(self.config, manager, event_bus))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use lifecycle_config::builders::config::ConfigBuilder;
	use lifecycle_storage::StorageFactory;
	use lifecycle_types::Order;

	fn all_factories() -> LifecycleFactories<StorageFactory> {
		LifecycleFactories {
			storage_factories: lifecycle_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[tokio::test]
	async fn test_build_with_memory_storage() {
		let engine = LifecycleBuilder::new(ConfigBuilder::new().build())
			.build(all_factories())
			.await
			.unwrap();

		let created = engine
			.manager()
			.create_order(Order::new(None, vec![]))
			.await
			.unwrap();
		assert!(engine.manager().get_order(created.id).await.is_ok());
	}

	#[tokio::test]
	async fn test_unknown_primary_is_rejected() {
		let mut config = ConfigBuilder::new().build();
		config.storage.primary = "redis".into();

		let result = LifecycleBuilder::new(config).build(all_factories()).await;
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}

	#[tokio::test]
	async fn test_no_registered_factory_is_missing_component() {
		let factories: LifecycleFactories<StorageFactory> = LifecycleFactories {
			storage_factories: HashMap::new(),
		};
		let result = LifecycleBuilder::new(ConfigBuilder::new().build())
			.build(factories)
			.await;
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[tokio::test]
	async fn test_factory_error_is_reported() {
		let mut bad = toml::map::Map::new();
		bad.insert("unexpected".into(), toml::Value::Boolean(true));
		let config = ConfigBuilder::new()
			.storage("memory", toml::Value::Table(bad))
			.build();

		let result = LifecycleBuilder::new(config).build(all_factories()).await;
		assert!(matches!(result, Err(BuilderError::Config(msg)) if msg.contains("memory")));
	}
}
