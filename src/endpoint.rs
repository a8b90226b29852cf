//! Replica endpoint contract and per-key change classification
//!
//! Both replica variants (local filesystem, remote object store) implement
//! [`Endpoint`]. The reconciliation engine depends only on this trait and
//! never branches on which variant it is talking to.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;

use crate::error::EndpointError;
use crate::index::IndexEntry;
use crate::types::{format_timestamp, SyncObject, Timestamp};

/// Result type for endpoint operations
pub type EndpointResult<T> = Result<T, EndpointError>;

/// Name reserved on both replicas for synchronization state: a directory at
/// the local root, a key prefix inside the object store
pub const STATE_DIR: &str = ".duplexr";

/// Index document name inside the state location
pub const INDEX_FILE: &str = "index.json";

/// Whether a key falls inside the reserved state location
pub fn is_reserved_key(key: &str) -> bool {
	key == STATE_DIR || key.starts_with(&format!("{}/", STATE_DIR))
}

/// A relative path that stays inside a replica root
pub(crate) fn well_formed_key(key: &str) -> bool {
	!key.is_empty()
		&& !key.starts_with('/')
		&& !key.ends_with('/')
		&& key.split('/').all(|part| !part.is_empty() && part != "." && part != "..")
}

/// Reject keys that are malformed or touch the reserved state location.
/// Stores check only well-formedness, since the index itself is stored
/// under the reserved prefix; endpoints check both.
pub(crate) fn validate_key(key: &str) -> Result<(), EndpointError> {
	if !well_formed_key(key) || is_reserved_key(key) {
		return Err(EndpointError::InvalidKey { key: key.to_string() });
	}
	Ok(())
}

/// How a key changed on one replica since its last confirmed sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
	NoChange,
	Updated,
	Deleted,
}

/// Transient per-key, per-replica classification for one cycle.
///
/// Computed from the replica's own content listing and its own index only,
/// never by looking at the other replica. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
	pub kind: ActionKind,
	pub timestamp: Option<Timestamp>,
}

impl Action {
	pub fn no_change(timestamp: Option<Timestamp>) -> Self {
		Action { kind: ActionKind::NoChange, timestamp }
	}

	pub fn updated(timestamp: Timestamp) -> Self {
		Action { kind: ActionKind::Updated, timestamp: Some(timestamp) }
	}

	pub fn deleted(timestamp: Option<Timestamp>) -> Self {
		Action { kind: ActionKind::Deleted, timestamp }
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.kind {
			ActionKind::NoChange => {
				write!(f, "unchanged (synced {})", format_timestamp(self.timestamp))
			}
			ActionKind::Updated => {
				write!(f, "updated at {}", format_timestamp(self.timestamp))
			}
			ActionKind::Deleted => {
				write!(f, "deleted (last synced {})", format_timestamp(self.timestamp))
			}
		}
	}
}

/// Classify one key from its current content timestamp and its index entry.
///
/// Shared by both endpoint variants so their classify semantics cannot
/// drift apart:
/// - no content, no entry: never existed here, `NoChange` without timestamp
/// - content, no entry: created since the last sync, `Updated`
/// - no content, entry: removed since the last sync, `Deleted` carrying the
///   last confirmed timestamp
/// - both: `Updated` only when content is strictly newer than the entry;
///   otherwise `NoChange` reporting the entry's value, since the index is
///   the tie-breaker when recorded state disagrees
pub fn classify_state(content: Option<Timestamp>, entry: Option<&IndexEntry>) -> Action {
	match (content, entry) {
		(None, None) => Action::no_change(None),
		(Some(t), None) => Action::updated(t),
		(None, Some(e)) => Action::deleted(e.remote_timestamp),
		(Some(t), Some(e)) => match e.remote_timestamp {
			Some(rt) if t > rt => Action::updated(t),
			Some(rt) => Action::no_change(Some(rt)),
			None => Action::updated(t),
		},
	}
}

/// One storage replica as seen by the reconciliation engine
#[async_trait]
pub trait Endpoint: Send {
	// === Content ===

	/// Keys known to this replica: present in content or recorded in the
	/// index (tombstones included, state locations excluded)
	async fn list_keys(&mut self) -> EndpointResult<BTreeSet<String>>;

	/// Classify one key per [`classify_state`]
	async fn classify(&self, key: &str) -> EndpointResult<Action>;

	/// Read content and its replica-native modification timestamp
	async fn read(&self, key: &str) -> EndpointResult<SyncObject>;

	/// Write content, stamping the replica-native timestamp from the object
	async fn write(&mut self, key: &str, object: &SyncObject) -> EndpointResult<()>;

	/// Remove content. Idempotent: deleting an absent key succeeds.
	async fn delete(&mut self, key: &str) -> EndpointResult<()>;

	// === Index ===

	/// Stage the synchronized timestamp for a key in memory
	fn record_sync_timestamp(&mut self, key: &str, timestamp: Option<Timestamp>);

	/// Promote the staged value into the durable index map
	fn commit_index_entry(&mut self, key: &str);

	/// Persist the full index
	async fn flush_index(&mut self) -> EndpointResult<()>;

	/// Committed timestamp for a key, if any
	fn recorded_timestamp(&self, key: &str) -> Option<Timestamp>;

	/// Keys with committed index entries, in order
	fn index_keys(&self) -> Vec<String>;

	// === Identity ===

	/// Human-readable replica identity for log lines
	fn uri(&self) -> String;
}


// vim: ts=4
