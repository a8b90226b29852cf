//! Remote object-store replica endpoint
//!
//! Content timestamps come from a custom attribute stored with each object,
//! never from any store-native mtime, since no store guarantees mtime
//! semantics consistent with the local side. The index is itself an object
//! under the reserved state prefix and is invisible to listings.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::endpoint::{
	classify_state, is_reserved_key, validate_key, Action, Endpoint, EndpointResult, INDEX_FILE,
	STATE_DIR,
};
use crate::error::EndpointError;
use crate::index::SyncIndex;
use crate::store::{Attributes, ObjectStore};
use crate::types::{SyncObject, Timestamp};

/// Attribute carrying the content timestamp on every synchronized object
pub const TIMESTAMP_ATTR: &str = "sync-timestamp";

fn index_object_key() -> String {
	format!("{}/{}", STATE_DIR, INDEX_FILE)
}

/// An object without a usable timestamp attribute cannot be ordered against
/// the other replica, so it surfaces as a classification failure instead of
/// being silently skipped or guessed at.
fn timestamp_attr(key: &str, attrs: &Attributes) -> Result<Timestamp, EndpointError> {
	match attrs.get(TIMESTAMP_ATTR) {
		Some(value) => value.parse().map_err(|_| EndpointError::BadTimestamp {
			key: key.to_string(),
			value: value.clone(),
		}),
		None => Err(EndpointError::BadTimestamp {
			key: key.to_string(),
			value: "(missing)".to_string(),
		}),
	}
}

/// One object store acting as a replica
pub struct RemoteEndpoint {
	store: Box<dyn ObjectStore>,
	index: SyncIndex,
}

impl RemoteEndpoint {
	/// Open a replica over a store, loading the index object if one was
	/// flushed before (a missing object is an empty index, not an error).
	pub async fn open(store: Box<dyn ObjectStore>) -> EndpointResult<Self> {
		let index = match store.get(&index_object_key()).await {
			Ok((data, _)) => SyncIndex::from_json(&data).map_err(|e| {
				EndpointError::IndexCorrupted {
					message: format!("{} on {}: {}", index_object_key(), store.uri(), e),
				}
			})?,
			Err(EndpointError::MissingObject { .. }) => SyncIndex::new(),
			Err(e) => return Err(e),
		};
		Ok(RemoteEndpoint { store, index })
	}
}

#[async_trait]
impl Endpoint for RemoteEndpoint {
	async fn list_keys(&mut self) -> EndpointResult<BTreeSet<String>> {
		let listing = self.store.list().await?;
		let mut keys: BTreeSet<String> =
			listing.into_keys().filter(|k| !is_reserved_key(k)).collect();
		keys.extend(self.index.keys().map(String::from));
		Ok(keys)
	}

	async fn classify(&self, key: &str) -> EndpointResult<Action> {
		validate_key(key)?;
		let content = match self.store.head(key).await? {
			Some(attrs) => Some(timestamp_attr(key, &attrs)?),
			None => None,
		};
		Ok(classify_state(content, self.index.entry(key)))
	}

	async fn read(&self, key: &str) -> EndpointResult<SyncObject> {
		validate_key(key)?;
		let (data, attrs) = self.store.get(key).await?;
		let timestamp = timestamp_attr(key, &attrs)?;
		Ok(SyncObject::new(data, timestamp))
	}

	async fn write(&mut self, key: &str, object: &SyncObject) -> EndpointResult<()> {
		validate_key(key)?;
		let mut attrs = Attributes::new();
		attrs.insert(TIMESTAMP_ATTR.to_string(), object.timestamp.to_string());
		self.store.put(key, &object.data, attrs).await
	}

	async fn delete(&mut self, key: &str) -> EndpointResult<()> {
		validate_key(key)?;
		self.store.delete(key).await
	}

	fn record_sync_timestamp(&mut self, key: &str, timestamp: Option<Timestamp>) {
		self.index.record(key, timestamp);
	}

	fn commit_index_entry(&mut self, key: &str) {
		self.index.commit(key);
	}

	async fn flush_index(&mut self) -> EndpointResult<()> {
		let data = self.index.to_json().map_err(|e| EndpointError::IndexCorrupted {
			message: format!("serializing index: {}", e),
		})?;
		self.store.put(&index_object_key(), &data, Attributes::new()).await
	}

	fn recorded_timestamp(&self, key: &str) -> Option<Timestamp> {
		self.index.remote_timestamp(key)
	}

	fn index_keys(&self) -> Vec<String> {
		self.index.keys().map(String::from).collect()
	}

	fn uri(&self) -> String {
		self.store.uri()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::MemStore;

	fn obj(data: &[u8], ts: Timestamp) -> SyncObject {
		SyncObject::new(data.to_vec(), ts)
	}

	#[tokio::test]
	async fn test_write_stamps_timestamp_attribute() {
		let store = std::sync::Arc::new(MemStore::new("t"));
		let mut ep = RemoteEndpoint::open(Box::new(store.clone())).await.unwrap();
		ep.write("a.txt", &obj(b"hi", 123)).await.unwrap();

		let (_, attrs) = store.get("a.txt").await.unwrap();
		assert_eq!(attrs.get(TIMESTAMP_ATTR).map(String::as_str), Some("123"));
		assert_eq!(ep.read("a.txt").await.unwrap(), obj(b"hi", 123));
	}

	#[tokio::test]
	async fn test_classify_uses_attribute_and_index() {
		let store = std::sync::Arc::new(MemStore::new("t"));
		let mut ep = RemoteEndpoint::open(Box::new(store.clone())).await.unwrap();
		ep.write("a.txt", &obj(b"hi", 100)).await.unwrap();

		// Fresh object, no index entry yet.
		let action = ep.classify("a.txt").await.unwrap();
		assert_eq!(action, Action::updated(100));

		ep.record_sync_timestamp("a.txt", Some(100));
		ep.commit_index_entry("a.txt");
		let action = ep.classify("a.txt").await.unwrap();
		assert_eq!(action, Action::no_change(Some(100)));

		// Gone from content, entry remains: deletion pending propagation.
		store.delete("a.txt").await.unwrap();
		let action = ep.classify("a.txt").await.unwrap();
		assert_eq!(action, Action::deleted(Some(100)));
	}

	#[tokio::test]
	async fn test_object_without_timestamp_attribute_is_an_error() {
		let store = std::sync::Arc::new(MemStore::new("t"));
		store.put("alien.bin", b"??", Attributes::new()).await.unwrap();
		let ep = RemoteEndpoint::open(Box::new(store)).await.unwrap();
		assert!(matches!(
			ep.classify("alien.bin").await,
			Err(EndpointError::BadTimestamp { .. })
		));
	}

	#[tokio::test]
	async fn test_index_object_survives_reopen_and_stays_unlisted() {
		let store = std::sync::Arc::new(MemStore::new("t"));
		{
			let mut ep = RemoteEndpoint::open(Box::new(store.clone())).await.unwrap();
			ep.write("a.txt", &obj(b"hi", 5)).await.unwrap();
			ep.record_sync_timestamp("a.txt", Some(5));
			ep.commit_index_entry("a.txt");
			ep.flush_index().await.unwrap();
		}
		let mut ep = RemoteEndpoint::open(Box::new(store)).await.unwrap();
		assert_eq!(ep.recorded_timestamp("a.txt"), Some(5));
		let keys = ep.list_keys().await.unwrap();
		assert!(keys.contains("a.txt"));
		assert!(!keys.iter().any(|k| k.starts_with(".duplexr")));
	}
}

// vim: ts=4
