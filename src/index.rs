//! Durable per-replica synchronization index.
//!
//! Each replica owns one [`SyncIndex`]: a map from key to the timestamp this
//! replica last confirmed was also reflected on the other replica. Mutations
//! follow a two-stage protocol driven by the reconciliation engine:
//! [`SyncIndex::record`] notes a pending value in memory, and
//! [`SyncIndex::commit`] promotes it into the durable map once the
//! corresponding content operation has succeeded. A key whose operation
//! failed is never committed, so it reclassifies and retries next cycle.
//!
//! Entries are never removed. A key that is gone from content but still has
//! an entry acts as a tombstone, which is what lets a deletion propagate to
//! the other replica on its next cycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Durable record for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexEntry {
	/// Timestamp last confirmed synchronized with the other replica
	pub remote_timestamp: Option<Timestamp>,
}

/// One replica's full index plus the in-memory pending layer
#[derive(Debug, Default)]
pub struct SyncIndex {
	entries: BTreeMap<String, IndexEntry>,
	pending: BTreeMap<String, Option<Timestamp>>,
}

impl SyncIndex {
	pub fn new() -> Self {
		SyncIndex::default()
	}

	/// Parse the serialized index document
	pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
		let entries: BTreeMap<String, IndexEntry> = serde_json::from_slice(data)?;
		Ok(SyncIndex { entries, pending: BTreeMap::new() })
	}

	/// Serialize the committed entries (pending values are not persisted)
	pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
		serde_json::to_vec_pretty(&self.entries)
	}

	/// Committed timestamp for a key, if any
	pub fn remote_timestamp(&self, key: &str) -> Option<Timestamp> {
		self.entries.get(key).and_then(|e| e.remote_timestamp)
	}

	/// Committed entry for a key, if any
	pub fn entry(&self, key: &str) -> Option<&IndexEntry> {
		self.entries.get(key)
	}

	/// Whether a committed entry exists for the key (tombstones included)
	pub fn contains(&self, key: &str) -> bool {
		self.entries.contains_key(key)
	}

	/// Stage a pending timestamp for the key
	pub fn record(&mut self, key: &str, timestamp: Option<Timestamp>) {
		self.pending.insert(key.to_string(), timestamp);
	}

	/// Promote the pending value into the committed map.
	///
	/// Without a pending value this is a no-op: the engine commits both
	/// replicas uniformly after each operation, and only the sides that
	/// actually recorded something change their entry.
	pub fn commit(&mut self, key: &str) {
		if let Some(ts) = self.pending.remove(key) {
			self.entries.entry(key.to_string()).or_default().remote_timestamp = ts;
		}
	}

	/// Committed keys, in order
	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(|k| k.as_str())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_record_then_commit() {
		let mut index = SyncIndex::new();
		index.record("a.txt", Some(100));
		assert_eq!(index.remote_timestamp("a.txt"), None);
		index.commit("a.txt");
		assert_eq!(index.remote_timestamp("a.txt"), Some(100));
	}

	#[test]
	fn test_commit_without_pending_keeps_entry() {
		let mut index = SyncIndex::new();
		index.record("a.txt", Some(100));
		index.commit("a.txt");
		index.commit("a.txt");
		assert_eq!(index.remote_timestamp("a.txt"), Some(100));
	}

	#[test]
	fn test_pending_not_visible_until_commit() {
		let mut index = SyncIndex::new();
		index.record("a.txt", Some(100));
		index.record("a.txt", Some(200));
		index.commit("a.txt");
		assert_eq!(index.remote_timestamp("a.txt"), Some(200));
	}

	#[test]
	fn test_json_roundtrip_drops_pending() {
		let mut index = SyncIndex::new();
		index.record("kept.txt", Some(11));
		index.commit("kept.txt");
		index.record("staged.txt", Some(22));

		let data = index.to_json().unwrap();
		let restored = SyncIndex::from_json(&data).unwrap();
		assert_eq!(restored.remote_timestamp("kept.txt"), Some(11));
		assert!(!restored.contains("staged.txt"));
	}

	#[test]
	fn test_from_json_rejects_garbage() {
		assert!(SyncIndex::from_json(b"not json").is_err());
	}
}

// vim: ts=4
