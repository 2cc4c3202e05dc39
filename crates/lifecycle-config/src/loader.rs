//! Loader for configurations split across several files.
//!
//! The entry file may list fragments under `include`. Fragments are merged
//! into the entry file's table, and each top-level section has a single
//! owning file. Fragments cannot include further files.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Reads an entry file plus its fragments into one [`Config`].
pub struct ConfigLoader {
	/// Directory relative paths are resolved against.
	root: PathBuf,
	/// Canonical paths read so far.
	seen: HashSet<PathBuf>,
	/// File that defined each top-level section.
	owners: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(root: impl AsRef<Path>) -> Self {
		Self {
			root: root.as_ref().to_path_buf(),
			seen: HashSet::new(),
			owners: HashMap::new(),
		}
	}

	/// Loads `entry` and its fragments, then validates the merged result.
	pub async fn load_config(&mut self, entry: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let entry = self.locate(entry.as_ref())?;
		let mut merged = self.read_fragment(&entry).await?;

		let fragments = match merged.remove("include") {
			Some(include) => include_paths(&include)?,
			None => Vec::new(),
		};
		self.claim_sections(&merged, &entry)?;

		for fragment in fragments {
			let path = self.locate(&fragment)?;
			let table = self.read_fragment(&path).await?;
			if table.contains_key("include") {
				return Err(ConfigError::Validation(format!(
					"{} includes other files; only the entry file may use include",
					path.display()
				)));
			}
			self.claim_sections(&table, &path)?;
			merged.extend(table);
		}

		let config: Config = toml::Value::Table(merged).try_into()?;
		config.validate()?;
		Ok(config)
	}

	/// Reads one file, resolving environment variables before parsing.
	async fn read_fragment(&mut self, path: &Path) -> Result<toml::Table, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await?;
		if !self.seen.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include: {} is read more than once",
				canonical.display()
			)));
		}

		let raw = tokio::fs::read_to_string(&canonical).await?;
		Ok(toml::from_str(&resolve_env_vars(&raw)?)?)
	}

	/// Records `path` as the owner of every section in `table`.
	fn claim_sections(&mut self, table: &toml::Table, path: &Path) -> Result<(), ConfigError> {
		for section in table.keys() {
			if let Some(owner) = self.owners.get(section) {
				return Err(ConfigError::Validation(format!(
					"Section [{}] is defined in both {} and {}",
					section,
					owner.display(),
					path.display()
				)));
			}
			self.owners.insert(section.clone(), path.to_path_buf());
		}
		Ok(())
	}

	fn locate(&self, path: &Path) -> Result<PathBuf, ConfigError> {
		let located = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.root.join(path)
		};

		if !located.is_file() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("No config file at {}", located.display()),
			)));
		}
		Ok(located)
	}
}

/// Accepts `include = "a.toml"` or `include = ["a.toml", "b.toml"]`.
fn include_paths(include: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	let invalid = || ConfigError::Validation("include takes a path or a list of paths".into());
	match include {
		toml::Value::String(path) => Ok(vec![PathBuf::from(path)]),
		toml::Value::Array(paths) => paths
			.iter()
			.map(|path| path.as_str().map(PathBuf::from).ok_or_else(invalid))
			.collect(),
		_ => Err(invalid()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("config.toml"),
			r#"
[service]
id = "single"

[storage]
primary = "memory"
[storage.implementations.memory]
"#,
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("config.toml").await.unwrap();
		assert_eq!(config.service.id, "single");
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			r#"
include = ["storage.toml", "lifecycle.toml"]

[service]
id = "split"
"#,
		)
		.unwrap();
		fs::write(
			temp_dir.path().join("storage.toml"),
			r#"
[storage]
primary = "memory"
[storage.implementations.memory]
"#,
		)
		.unwrap();
		fs::write(
			temp_dir.path().join("lifecycle.toml"),
			"[lifecycle]\nmax_concurrent_dispatches = 4\n",
		)
		.unwrap();

		let path = temp_dir.path().join("main.toml");
		let config = Config::from_file(path.to_str().unwrap()).await.unwrap();
		assert_eq!(config.service.id, "split");
		assert_eq!(config.storage.primary, "memory");
		assert_eq!(config.lifecycle.max_concurrent_dispatches, 4);
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			r#"
include = "other.toml"

[service]
id = "dup"

[storage]
primary = "memory"
[storage.implementations.memory]
"#,
		)
		.unwrap();
		fs::write(
			temp_dir.path().join("other.toml"),
			"[service]\nid = \"again\"\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(err.to_string().contains("Section [service] is defined in both"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			"include = [\"main.toml\"]\n[service]\nid = \"loop\"\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(err.to_string().contains("Circular include"));
	}

	#[tokio::test]
	async fn test_fragment_cannot_include() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			"include = \"storage.toml\"\n[service]\nid = \"nested\"\n",
		)
		.unwrap();
		fs::write(
			temp_dir.path().join("storage.toml"),
			"include = \"lifecycle.toml\"\n[storage]\nprimary = \"memory\"\n[storage.implementations.memory]\n",
		)
		.unwrap();
		fs::write(temp_dir.path().join("lifecycle.toml"), "[lifecycle]\n").unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(err.to_string().contains("only the entry file may use include"));
	}

	#[tokio::test]
	async fn test_include_must_be_paths() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			"include = 3\n[service]\nid = \"x\"\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		assert!(matches!(
			loader.load_config("main.toml").await,
			Err(ConfigError::Validation(_))
		));
	}

	#[tokio::test]
	async fn test_missing_include_reported() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			"include = [\"absent.toml\"]\n[service]\nid = \"x\"\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(matches!(err, ConfigError::Io(_)));
	}
}
