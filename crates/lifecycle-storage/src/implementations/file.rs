//! File-based storage backend implementation.
//!
//! Each key is stored as its own JSON file under a base directory. Writes go
//! to a temporary file that is synced and then renamed over the target, so a
//! reader never observes a half-written record.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use fs2::FileExt;
use lifecycle_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const DEFAULT_STORAGE_PATH: &str = "./data/orders";
const LOCK_FILE: &str = ".lock";

/// File-based storage implementation.
///
/// Holds an exclusive advisory lock on `<base_path>/.lock` for its whole
/// lifetime, so a second process (or a second instance) pointed at the same
/// directory fails to start instead of racing on the records.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// Kept open to hold the directory lock.
	_lock: File,
}

impl FileStorage {
	/// Opens a FileStorage rooted at `base_path`, creating the directory.
	pub fn open(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
		let base_path = base_path.as_ref().to_path_buf();
		std::fs::create_dir_all(&base_path).map_err(|e| StorageError::Backend(e.to_string()))?;

		let lock_path = base_path.join(LOCK_FILE);
		let lock = OpenOptions::new()
			.create(true)
			.truncate(false)
			.write(true)
			.open(&lock_path)
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		lock.try_lock_exclusive().map_err(|e| {
			StorageError::Backend(format!(
				"Storage directory {} is locked by another owner: {}",
				base_path.display(),
				e
			))
		})?;

		tracing::debug!(path = %base_path.display(), "Opened file storage");
		Ok(Self {
			base_path,
			_lock: lock,
		})
	}

	/// Converts a storage key to a filesystem-safe file path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', ':', '\\'], "_");
		self.base_path.join(format!("{}.json", safe_key))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);
		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.get_file_path(key);
		let temp_path = path.with_extension("tmp");

		let mut file = fs::File::create(&temp_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		file.write_all(&value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		file.sync_all()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		drop(file);

		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.get_file_path(key);
		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		fs::try_exists(self.get_file_path(key))
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String)],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for order files (default: "./data/orders")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::open(storage_path)?))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
