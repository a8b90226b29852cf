//! Object-store seam behind the remote endpoint
//!
//! [`ObjectStore`] is the boundary where a cloud wire client (authentication,
//! HTTP calls, listing pagination) would plug in. Two implementations ship:
//! [`DirStore`] keeps objects as plain files under a directory with all
//! attributes in a JSON sidecar document, making `file://` targets fully
//! runnable without a network; [`MemStore`] backs tests and fixtures.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs as afs;
use tokio::sync::Mutex;

use crate::endpoint::{well_formed_key, EndpointResult, STATE_DIR};
use crate::error::EndpointError;
use crate::util::{atomic_write, walk_files};

/// Flat string attributes stored with each object
pub type Attributes = BTreeMap<String, String>;

/// Minimal object storage capability set
#[async_trait]
pub trait ObjectStore: Send + Sync {
	/// Every object with its attributes
	async fn list(&self) -> EndpointResult<BTreeMap<String, Attributes>>;

	/// Attributes for one object, `None` when absent
	async fn head(&self, key: &str) -> EndpointResult<Option<Attributes>>;

	/// Content and attributes for one object
	async fn get(&self, key: &str) -> EndpointResult<(Vec<u8>, Attributes)>;

	/// Create or replace one object
	async fn put(&self, key: &str, data: &[u8], attrs: Attributes) -> EndpointResult<()>;

	/// Remove one object. Idempotent: deleting an absent key succeeds.
	async fn delete(&self, key: &str) -> EndpointResult<()>;

	/// Store identity for log lines
	fn uri(&self) -> String;
}

// Forwarding impl so tests can keep a handle on a store they hand to an
// endpoint (e.g. Box<Arc<MemStore>>).
#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
	async fn list(&self) -> EndpointResult<BTreeMap<String, Attributes>> {
		(**self).list().await
	}

	async fn head(&self, key: &str) -> EndpointResult<Option<Attributes>> {
		(**self).head(key).await
	}

	async fn get(&self, key: &str) -> EndpointResult<(Vec<u8>, Attributes)> {
		(**self).get(key).await
	}

	async fn put(&self, key: &str, data: &[u8], attrs: Attributes) -> EndpointResult<()> {
		(**self).put(key, data, attrs).await
	}

	async fn delete(&self, key: &str) -> EndpointResult<()> {
		(**self).delete(key).await
	}

	fn uri(&self) -> String {
		(**self).uri()
	}
}

//////////
// DirStore
//////////

/// Attributes sidecar document inside the store's state directory
const ATTRS_FILE: &str = "attrs.json";

/// Directory-backed object store for `file://` targets.
///
/// Object content lives as plain files under the root; every attribute,
/// including the synchronization timestamp, lives in one JSON sidecar
/// document. File mtimes under the store are never consulted, matching a
/// store that has no native mtime semantics.
pub struct DirStore {
	root: PathBuf,
}

impl DirStore {
	/// Open a store directory, creating it if needed
	pub async fn open(root: impl Into<PathBuf>) -> EndpointResult<Self> {
		let root = root.into();
		afs::create_dir_all(&root).await?;
		Ok(DirStore { root })
	}

	fn object_path(&self, key: &str) -> Result<PathBuf, EndpointError> {
		if !well_formed_key(key) {
			return Err(EndpointError::InvalidKey { key: key.to_string() });
		}
		Ok(self.root.join(key))
	}

	fn attrs_path(&self) -> PathBuf {
		self.root.join(STATE_DIR).join(ATTRS_FILE)
	}

	async fn load_attrs(&self) -> EndpointResult<BTreeMap<String, Attributes>> {
		match afs::read(self.attrs_path()).await {
			Ok(data) => serde_json::from_slice(&data).map_err(|e| EndpointError::Store {
				message: format!("attributes document corrupted: {}", e),
			}),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
			Err(e) => Err(EndpointError::Io(e)),
		}
	}

	async fn save_attrs(&self, attrs: &BTreeMap<String, Attributes>) -> EndpointResult<()> {
		let path = self.attrs_path();
		if let Some(parent) = path.parent() {
			afs::create_dir_all(parent).await?;
		}
		let data = serde_json::to_vec_pretty(attrs).map_err(|e| EndpointError::Store {
			message: format!("serializing attributes: {}", e),
		})?;
		atomic_write(&path, &data, None).await?;
		Ok(())
	}
}

#[async_trait]
impl ObjectStore for DirStore {
	async fn list(&self) -> EndpointResult<BTreeMap<String, Attributes>> {
		let keys = walk_files(&self.root).await?;
		let attrs = self.load_attrs().await?;
		Ok(keys
			.into_iter()
			.map(|key| {
				let a = attrs.get(&key).cloned().unwrap_or_default();
				(key, a)
			})
			.collect())
	}

	async fn head(&self, key: &str) -> EndpointResult<Option<Attributes>> {
		let path = self.object_path(key)?;
		match afs::symlink_metadata(&path).await {
			Ok(meta) if meta.is_file() => {
				let attrs = self.load_attrs().await?;
				Ok(Some(attrs.get(key).cloned().unwrap_or_default()))
			}
			Ok(_) => Ok(None),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(EndpointError::Io(e)),
		}
	}

	async fn get(&self, key: &str) -> EndpointResult<(Vec<u8>, Attributes)> {
		let path = self.object_path(key)?;
		let data = match afs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				return Err(EndpointError::MissingObject { key: key.to_string() })
			}
			Err(e) => return Err(EndpointError::Io(e)),
		};
		let attrs = self.load_attrs().await?;
		Ok((data, attrs.get(key).cloned().unwrap_or_default()))
	}

	async fn put(&self, key: &str, data: &[u8], attrs: Attributes) -> EndpointResult<()> {
		let path = self.object_path(key)?;
		if let Some(parent) = path.parent() {
			afs::create_dir_all(parent).await?;
		}
		atomic_write(&path, data, None).await?;
		let mut all = self.load_attrs().await?;
		all.insert(key.to_string(), attrs);
		self.save_attrs(&all).await
	}

	async fn delete(&self, key: &str) -> EndpointResult<()> {
		let path = self.object_path(key)?;
		match afs::remove_file(&path).await {
			Ok(()) => {}
			Err(e) if e.kind() == io::ErrorKind::NotFound => {}
			Err(e) => return Err(EndpointError::Io(e)),
		}
		let mut all = self.load_attrs().await?;
		if all.remove(key).is_some() {
			self.save_attrs(&all).await?;
		}
		Ok(())
	}

	fn uri(&self) -> String {
		format!("file://{}", self.root.display())
	}
}

//////////
// MemStore
//////////

/// In-memory object store for tests and fixtures
#[derive(Default)]
pub struct MemStore {
	name: String,
	objects: Mutex<BTreeMap<String, (Vec<u8>, Attributes)>>,
}

impl MemStore {
	pub fn new(name: &str) -> Self {
		MemStore { name: name.to_string(), objects: Mutex::new(BTreeMap::new()) }
	}
}

#[async_trait]
impl ObjectStore for MemStore {
	async fn list(&self) -> EndpointResult<BTreeMap<String, Attributes>> {
		let objects = self.objects.lock().await;
		Ok(objects.iter().map(|(k, (_, a))| (k.clone(), a.clone())).collect())
	}

	async fn head(&self, key: &str) -> EndpointResult<Option<Attributes>> {
		let objects = self.objects.lock().await;
		Ok(objects.get(key).map(|(_, a)| a.clone()))
	}

	async fn get(&self, key: &str) -> EndpointResult<(Vec<u8>, Attributes)> {
		let objects = self.objects.lock().await;
		objects
			.get(key)
			.cloned()
			.ok_or_else(|| EndpointError::MissingObject { key: key.to_string() })
	}

	async fn put(&self, key: &str, data: &[u8], attrs: Attributes) -> EndpointResult<()> {
		let mut objects = self.objects.lock().await;
		objects.insert(key.to_string(), (data.to_vec(), attrs));
		Ok(())
	}

	async fn delete(&self, key: &str) -> EndpointResult<()> {
		let mut objects = self.objects.lock().await;
		objects.remove(key);
		Ok(())
	}

	fn uri(&self) -> String {
		format!("mem://{}", self.name)
	}
}


// vim: ts=4
