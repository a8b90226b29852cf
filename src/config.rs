//! Configuration for sync targets
//!
//! Targets live in a single JSON document, one entry per name, managed
//! through the `add`, `edit` and `rm` commands.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs as afs;

use crate::error::SyncError;
use crate::util;

/// One configured pairing of a local tree with a remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
	/// Root directory of the local replica
	pub local_root: PathBuf,

	/// URI of the remote replica, e.g. `file:///backup/projects`
	pub remote_uri: String,

	/// Access credentials, for stores that need them
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_key: Option<String>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub secret_key: Option<String>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub region: Option<String>,
}

/// Top level configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
	pub targets: BTreeMap<String, TargetConfig>,
}

impl AppConfig {
	/// Default config file location, `<config dir>/duplexr/config.json`
	pub fn default_path() -> Result<PathBuf, SyncError> {
		let base = dirs::config_dir().ok_or_else(|| SyncError::Config {
			message: "No configuration directory on this system".to_string(),
		})?;
		Ok(base.join("duplexr").join("config.json"))
	}

	/// Load from `path`. A missing file is an empty configuration.
	pub async fn load(path: &Path) -> Result<Self, SyncError> {
		let raw = match afs::read(path).await {
			Ok(raw) => raw,
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				return Ok(AppConfig::default());
			}
			Err(e) => return Err(SyncError::Io(e)),
		};
		serde_json::from_slice(&raw).map_err(|e| SyncError::Config {
			message: format!("Cannot parse {}: {}", path.display(), e),
		})
	}

	/// Persist to `path`, creating parent directories as needed
	pub async fn save(&self, path: &Path) -> Result<(), SyncError> {
		if let Some(parent) = path.parent() {
			afs::create_dir_all(parent).await?;
		}
		let mut raw = serde_json::to_vec_pretty(self).map_err(|e| SyncError::Config {
			message: format!("Cannot serialize configuration: {}", e),
		})?;
		raw.push(b'\n');
		util::atomic_write(path, &raw, None).await?;
		Ok(())
	}

	/// Look up a target by name, listing the alternatives on a miss
	pub fn target(&self, name: &str) -> Result<&TargetConfig, SyncError> {
		self.targets.get(name).ok_or_else(|| SyncError::UnknownTarget {
			name: name.to_string(),
			choices: self.targets.keys().cloned().collect(),
		})
	}

	/// Resolve the requested target names, or every configured target
	/// when none are named. Unknown names fail before any work starts.
	pub fn select(&self, names: &[String]) -> Result<Vec<(String, TargetConfig)>, SyncError> {
		if names.is_empty() {
			return Ok(self
				.targets
				.iter()
				.map(|(name, target)| (name.clone(), target.clone()))
				.collect());
		}
		let mut picked = Vec::with_capacity(names.len());
		for name in names {
			picked.push((name.clone(), self.target(name)?.clone()));
		}
		Ok(picked)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn sample_target(root: &str) -> TargetConfig {
		TargetConfig {
			local_root: PathBuf::from(root),
			remote_uri: "file:///backup/projects".to_string(),
			access_key: None,
			secret_key: None,
			region: None,
		}
	}

	#[tokio::test]
	async fn test_missing_file_is_empty_config() {
		let dir = TempDir::new().unwrap();
		let config = AppConfig::load(&dir.path().join("nope.json")).await.unwrap();
		assert!(config.targets.is_empty());
	}

	#[tokio::test]
	async fn test_save_and_reload() {
		let dir = TempDir::new().unwrap();
		// Nested path, save() has to create the parents
		let path = dir.path().join("duplexr").join("config.json");

		let mut config = AppConfig::default();
		config.targets.insert("projects".to_string(), sample_target("/home/me/projects"));
		config.save(&path).await.unwrap();

		let reloaded = AppConfig::load(&path).await.unwrap();
		assert_eq!(reloaded.targets.len(), 1);
		assert_eq!(reloaded.targets["projects"], config.targets["projects"]);
	}

	#[tokio::test]
	async fn test_garbage_file_is_rejected() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.json");
		tokio::fs::write(&path, b"{not json").await.unwrap();

		match AppConfig::load(&path).await {
			Err(SyncError::Config { .. }) => {}
			other => panic!("expected config error, got {:?}", other.map(|c| c.targets.len())),
		}
	}

	#[test]
	fn test_unknown_target_lists_choices() {
		let mut config = AppConfig::default();
		config.targets.insert("docs".to_string(), sample_target("/home/me/docs"));
		config.targets.insert("music".to_string(), sample_target("/home/me/music"));

		match config.target("photos") {
			Err(SyncError::UnknownTarget { name, choices }) => {
				assert_eq!(name, "photos");
				assert_eq!(choices, vec!["docs".to_string(), "music".to_string()]);
			}
			other => panic!("expected unknown target, got {:?}", other.is_ok()),
		}
	}

	#[test]
	fn test_select_defaults_to_all_targets() {
		let mut config = AppConfig::default();
		config.targets.insert("a".to_string(), sample_target("/a"));
		config.targets.insert("b".to_string(), sample_target("/b"));

		let all = config.select(&[]).unwrap();
		assert_eq!(all.len(), 2);

		let one = config.select(&["b".to_string()]).unwrap();
		assert_eq!(one.len(), 1);
		assert_eq!(one[0].0, "b");

		assert!(config.select(&["c".to_string()]).is_err());
	}
}

// vim: ts=4
