//! Background sync workers driven by filesystem events
//!
//! One [`SyncWorker`] runs per target: it installs recursive watches on
//! the local root, reconciles once to catch up, then keeps reconciling
//! whenever relevant filesystem activity arrives. Endpoints are opened
//! fresh for every pass so index changes made by other writers of the
//! same remote are picked up.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use crate::config::TargetConfig;
use crate::endpoint::{Endpoint, STATE_DIR};
use crate::engine::{self, CycleReport};
use crate::error::SyncError;
use crate::local::LocalEndpoint;
use crate::logging::*;
use crate::remote::RemoteEndpoint;
use crate::store::{DirStore, ObjectStore};
use crate::util::TMP_SUFFIX;
use crate::watcher::{RecursiveWatcher, WatchEvent, WATCH_MASK};

/// Decides after each pass whether a worker should stop. Daemons run
/// with `|_| false`; tests inject a bounded predicate.
pub type Terminator = Arc<dyn Fn(u64) -> bool + Send + Sync>;

/// Upper bound on a single event read, so the terminator is consulted
/// even while the tree is quiet
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Open the store a remote URI points at
async fn open_store(uri: &str) -> Result<Box<dyn ObjectStore>, SyncError> {
	if let Some(path) = uri.strip_prefix("file://") {
		let store = DirStore::open(Path::new(path)).await?;
		return Ok(Box::new(store));
	}
	Err(SyncError::Config {
		message: format!("Unsupported remote URI '{}' (expected file://<path>)", uri),
	})
}

/// Open both replicas of a target
pub async fn endpoint_pair(
	target: &TargetConfig,
) -> Result<(LocalEndpoint, RemoteEndpoint), SyncError> {
	let local = LocalEndpoint::open(&target.local_root).await?;
	let store = open_store(&target.remote_uri).await?;
	let remote = RemoteEndpoint::open(store).await?;
	Ok((local, remote))
}

/// Run one full reconciliation pass for a named target
pub async fn sync_target(name: &str, target: &TargetConfig) -> Result<CycleReport, SyncError> {
	let (mut local, mut remote) = endpoint_pair(target).await?;
	info!("Syncing {} [{} <=> {}]", name, local.uri(), remote.uri());
	engine::reconcile(&mut local, &mut remote).await
}

/// Event-driven sync loop for a single target
pub struct SyncWorker {
	name: String,
	target: TargetConfig,
	debounce: Duration,
	terminator: Terminator,
}

impl SyncWorker {
	pub fn new(
		name: String,
		target: TargetConfig,
		debounce: Duration,
		terminator: Terminator,
	) -> Self {
		SyncWorker { name, target, debounce, terminator }
	}

	/// Drive the worker until its terminator fires. Failures of a
	/// single pass are logged and retried on the next event; only a
	/// broken watch setup stops the worker.
	pub async fn run(&self) {
		if let Err(e) = self.watch_loop().await {
			error!("Worker for '{}' stopped: {}", self.name, e);
		}
	}

	async fn watch_loop(&self) -> Result<(), SyncError> {
		let mut watcher = RecursiveWatcher::new(READ_TIMEOUT)?;
		watcher.add_watches(&self.target.local_root, WATCH_MASK)?;
		let state_dir = self.target.local_root.join(STATE_DIR);

		// Catch up on whatever happened while nobody was looking
		self.sync_once().await;

		let mut index = 0;
		while !(self.terminator)(index) {
			let events = watcher.read().await?;
			if self.note_events(&mut watcher, &events, &state_dir) {
				if !self.debounce.is_zero() {
					// Let the burst settle before reconciling
					time::sleep(self.debounce).await;
				}
				self.sync_once().await;
			}
			index += 1;
		}
		Ok(())
	}

	/// Extend watches onto newly appeared directories and report
	/// whether any event touched synced content. Index flushes and
	/// in-flight temp files of our own making are ignored, otherwise
	/// every pass would schedule the next one.
	fn note_events(
		&self,
		watcher: &mut RecursiveWatcher,
		events: &[WatchEvent],
		state_dir: &Path,
	) -> bool {
		let mut relevant = false;
		for event in events {
			let path: PathBuf = match watcher.event_path(event) {
				Some(path) => path,
				None => continue,
			};
			if path.starts_with(state_dir) {
				continue;
			}
			if let Some(name) = &event.name {
				if name.ends_with(TMP_SUFFIX) {
					continue;
				}
			}
			if event.creates_directory() {
				if let Err(e) = watcher.add_watches(&path, WATCH_MASK) {
					warn!("Cannot extend watches to {}: {}", path.display(), e);
				}
			}
			debug!("Change in {}", path.display());
			relevant = true;
		}
		relevant
	}

	async fn sync_once(&self) {
		if let Err(e) = sync_target(&self.name, &self.target).await {
			error!("Sync failed for '{}': {}", self.name, e);
		}
	}
}

// vim: ts=4
