//! Local filesystem replica endpoint
//!
//! Content timestamps are file mtimes truncated to whole seconds. Writes go
//! through a temp file in the same directory and are renamed into place with
//! the mtime already stamped, so a key is never observable half-written. The
//! index document lives under a state directory at the replica root, which
//! is invisible to listings.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use filetime::FileTime;
use tokio::fs as afs;

use crate::endpoint::{
	classify_state, validate_key, Action, Endpoint, EndpointResult, INDEX_FILE, STATE_DIR,
};
use crate::error::EndpointError;
use crate::index::SyncIndex;
use crate::types::{SyncObject, Timestamp};
use crate::util::{atomic_write, walk_files};

/// One local directory tree acting as a replica
pub struct LocalEndpoint {
	root: PathBuf,
	index: SyncIndex,
}

impl LocalEndpoint {
	/// Open a replica rooted at an existing directory, loading its index
	/// document if one was flushed before (a missing document is an empty
	/// index, not an error).
	pub async fn open(root: impl Into<PathBuf>) -> EndpointResult<Self> {
		let root = root.into();
		let meta = afs::metadata(&root).await?;
		if !meta.is_dir() {
			return Err(EndpointError::Io(io::Error::new(
				io::ErrorKind::NotADirectory,
				format!("{} is not a directory", root.display()),
			)));
		}
		let index_path = root.join(STATE_DIR).join(INDEX_FILE);
		let index = match afs::read(&index_path).await {
			Ok(data) => SyncIndex::from_json(&data).map_err(|e| {
				EndpointError::IndexCorrupted {
					message: format!("{}: {}", index_path.display(), e),
				}
			})?,
			Err(e) if e.kind() == io::ErrorKind::NotFound => SyncIndex::new(),
			Err(e) => return Err(EndpointError::Io(e)),
		};
		Ok(LocalEndpoint { root, index })
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn key_path(&self, key: &str) -> Result<PathBuf, EndpointError> {
		validate_key(key)?;
		Ok(self.root.join(key))
	}

	fn index_path(&self) -> PathBuf {
		self.root.join(STATE_DIR).join(INDEX_FILE)
	}

	/// Current content mtime for a key; `None` when the key is absent or is
	/// not a regular file (directories and symlinks are not objects)
	async fn content_timestamp(&self, key: &str) -> EndpointResult<Option<Timestamp>> {
		let path = self.key_path(key)?;
		match afs::symlink_metadata(&path).await {
			Ok(meta) if meta.is_file() => {
				Ok(Some(FileTime::from_last_modification_time(&meta).unix_seconds()))
			}
			Ok(_) => Ok(None),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(EndpointError::Io(e)),
		}
	}
}

#[async_trait]
impl Endpoint for LocalEndpoint {
	async fn list_keys(&mut self) -> EndpointResult<BTreeSet<String>> {
		let mut keys = walk_files(&self.root).await?;
		keys.extend(self.index.keys().map(String::from));
		Ok(keys)
	}

	async fn classify(&self, key: &str) -> EndpointResult<Action> {
		let content = self.content_timestamp(key).await?;
		Ok(classify_state(content, self.index.entry(key)))
	}

	async fn read(&self, key: &str) -> EndpointResult<SyncObject> {
		let path = self.key_path(key)?;
		let data = match afs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				return Err(EndpointError::MissingObject { key: key.to_string() })
			}
			Err(e) => return Err(EndpointError::Io(e)),
		};
		let meta = afs::metadata(&path).await?;
		let timestamp = FileTime::from_last_modification_time(&meta).unix_seconds();
		Ok(SyncObject::new(data, timestamp))
	}

	async fn write(&mut self, key: &str, object: &SyncObject) -> EndpointResult<()> {
		let path = self.key_path(key)?;
		if let Some(parent) = path.parent() {
			afs::create_dir_all(parent).await?;
		}
		atomic_write(&path, &object.data, Some(object.timestamp)).await?;
		Ok(())
	}

	async fn delete(&mut self, key: &str) -> EndpointResult<()> {
		let path = self.key_path(key)?;
		match afs::remove_file(&path).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(EndpointError::Io(e)),
		}
	}

	fn record_sync_timestamp(&mut self, key: &str, timestamp: Option<Timestamp>) {
		self.index.record(key, timestamp);
	}

	fn commit_index_entry(&mut self, key: &str) {
		self.index.commit(key);
	}

	async fn flush_index(&mut self) -> EndpointResult<()> {
		let path = self.index_path();
		if let Some(parent) = path.parent() {
			afs::create_dir_all(parent).await?;
		}
		let data = self.index.to_json().map_err(|e| EndpointError::IndexCorrupted {
			message: format!("serializing index: {}", e),
		})?;
		atomic_write(&path, &data, None).await?;
		Ok(())
	}

	fn recorded_timestamp(&self, key: &str) -> Option<Timestamp> {
		self.index.remote_timestamp(key)
	}

	fn index_keys(&self) -> Vec<String> {
		self.index.keys().map(String::from).collect()
	}

	fn uri(&self) -> String {
		self.root.display().to_string()
	}
}

// vim: ts=4
