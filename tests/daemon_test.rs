/// Daemon and worker tests over temp directory targets
///
/// Workers are driven with injected terminators, so every test runs a
/// bounded number of watch iterations and returns on its own.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time;

use duplexr::cli::daemon_command;
use duplexr::config::{AppConfig, TargetConfig};
use duplexr::daemon::{sync_target, SyncWorker};
use duplexr::error::SyncError;
use duplexr::store::{DirStore, ObjectStore};

fn target_for(local: &Path, remote: &Path) -> TargetConfig {
	TargetConfig {
		local_root: local.to_path_buf(),
		remote_uri: format!("file://{}", remote.display()),
		access_key: None,
		secret_key: None,
		region: None,
	}
}

// ===================================================================
// ONE-SHOT SYNC
// ===================================================================

#[tokio::test]
async fn test_sync_target_converges_a_pair() {
	let local = TempDir::new().unwrap();
	let remote = TempDir::new().unwrap();
	std::fs::write(local.path().join("notes.txt"), b"content").unwrap();

	let report = sync_target("home", &target_for(local.path(), remote.path()))
		.await
		.unwrap();
	assert_eq!(report.applied, 1);

	let store = DirStore::open(remote.path()).await.unwrap();
	let (data, _) = store.get("notes.txt").await.unwrap();
	assert_eq!(data, b"content");
}

#[tokio::test]
async fn test_sync_target_rejects_unsupported_uris() {
	let local = TempDir::new().unwrap();
	let target = TargetConfig {
		local_root: local.path().to_path_buf(),
		remote_uri: "s3://bucket/prefix".to_string(),
		access_key: None,
		secret_key: None,
		region: None,
	};

	match sync_target("cloud", &target).await {
		Err(SyncError::Config { message }) => assert!(message.contains("s3://bucket/prefix")),
		other => panic!("expected a config error, got {:?}", other),
	}
}

// ===================================================================
// WORKER
// ===================================================================

#[tokio::test]
async fn test_worker_initial_sync_runs_before_any_event() {
	let local = TempDir::new().unwrap();
	let remote = TempDir::new().unwrap();
	std::fs::write(local.path().join("seed.txt"), b"early").unwrap();

	// Terminating on the first consultation leaves only the initial sync
	let worker = SyncWorker::new(
		"t".to_string(),
		target_for(local.path(), remote.path()),
		Duration::ZERO,
		Arc::new(|_| true),
	);
	worker.run().await;

	let store = DirStore::open(remote.path()).await.unwrap();
	assert!(store.head("seed.txt").await.unwrap().is_some());
}

#[tokio::test]
async fn test_worker_syncs_on_filesystem_events() {
	let local = TempDir::new().unwrap();
	let remote = TempDir::new().unwrap();

	// One watch iteration, then stop
	let worker = SyncWorker::new(
		"t".to_string(),
		target_for(local.path(), remote.path()),
		Duration::ZERO,
		Arc::new(|i| i >= 1),
	);
	let local_root = local.path().to_path_buf();
	let handle = tokio::spawn(async move { worker.run().await });

	time::sleep(Duration::from_millis(100)).await;
	std::fs::write(local_root.join("live.txt"), b"fresh").unwrap();
	handle.await.unwrap();

	let store = DirStore::open(remote.path()).await.unwrap();
	let (data, _) = store.get("live.txt").await.unwrap();
	assert_eq!(data, b"fresh");
}

#[tokio::test]
async fn test_worker_with_broken_target_stops_cleanly() {
	let remote = TempDir::new().unwrap();
	let worker = SyncWorker::new(
		"broken".to_string(),
		TargetConfig {
			local_root: PathBuf::from("/nonexistent/nowhere"),
			remote_uri: format!("file://{}", remote.path().display()),
			access_key: None,
			secret_key: None,
			region: None,
		},
		Duration::ZERO,
		Arc::new(|_| true),
	);
	// The failure is logged, not propagated
	worker.run().await;
}

// ===================================================================
// DAEMON COMMAND
// ===================================================================

#[tokio::test]
async fn test_daemon_without_targets_returns_without_workers() {
	let config = AppConfig::default();
	daemon_command(&config, &[], Duration::ZERO, Arc::new(|_| true))
		.await
		.unwrap();
}

#[tokio::test]
async fn test_daemon_rejects_unknown_targets_before_starting() {
	let local = TempDir::new().unwrap();
	let remote = TempDir::new().unwrap();
	let mut config = AppConfig::default();
	config
		.targets
		.insert("real".to_string(), target_for(local.path(), remote.path()));

	let err = daemon_command(
		&config,
		&["ghost".to_string()],
		Duration::ZERO,
		Arc::new(|_| true),
	)
	.await
	.unwrap_err();
	assert!(matches!(err, SyncError::UnknownTarget { .. }));
}

#[tokio::test]
async fn test_daemon_runs_every_worker_to_completion() {
	let local_a = TempDir::new().unwrap();
	let remote_a = TempDir::new().unwrap();
	let local_b = TempDir::new().unwrap();
	let remote_b = TempDir::new().unwrap();
	std::fs::write(local_a.path().join("a.txt"), b"a").unwrap();
	std::fs::write(local_b.path().join("b.txt"), b"b").unwrap();

	let mut config = AppConfig::default();
	config
		.targets
		.insert("a".to_string(), target_for(local_a.path(), remote_a.path()));
	config
		.targets
		.insert("b".to_string(), target_for(local_b.path(), remote_b.path()));

	daemon_command(&config, &[], Duration::ZERO, Arc::new(|_| true))
		.await
		.unwrap();

	let store_a = DirStore::open(remote_a.path()).await.unwrap();
	let store_b = DirStore::open(remote_b.path()).await.unwrap();
	assert!(store_a.head("a.txt").await.unwrap().is_some());
	assert!(store_b.head("b.txt").await.unwrap().is_some());
}

// vim: ts=4
