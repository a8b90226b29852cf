//! Command implementations behind the duplexr binary
//!
//! Each subcommand maps to one function here. Commands that change the
//! configuration save it back atomically; commands that touch replicas
//! open them through [`daemon::endpoint_pair`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future;
use tokio::signal;

use crate::config::{AppConfig, TargetConfig};
use crate::daemon::{self, SyncWorker, Terminator};
use crate::endpoint::{Action, ActionKind, Endpoint};
use crate::error::SyncError;
use crate::logging::*;
use crate::types::{format_timestamp, Timestamp};
use crate::util;

fn none_if_empty(value: String) -> Option<String> {
	if value.is_empty() {
		None
	} else {
		Some(value)
	}
}

/// Interactively register a new target
pub async fn add_command(config_path: &Path, mut config: AppConfig) -> Result<(), SyncError> {
	let local_root = util::prompt("Local folder", None)?;
	if local_root.is_empty() {
		return Err(SyncError::Config {
			message: "Local folder must not be empty".to_string(),
		});
	}
	let remote_uri = util::prompt("Remote URI", None)?;
	if remote_uri.is_empty() {
		return Err(SyncError::Config {
			message: "Remote URI must not be empty".to_string(),
		});
	}
	let access_key = util::prompt("Access key (blank for none)", None)?;
	let secret_key = util::prompt_secret("Secret key (blank for none)")?;
	let region = util::prompt("Region (blank for none)", None)?;

	let suggested = Path::new(&local_root)
		.file_name()
		.and_then(|n| n.to_str())
		.map(str::to_string);
	let name = util::prompt("Target name", suggested.as_deref())?;
	if name.is_empty() {
		return Err(SyncError::Config {
			message: "Target name must not be empty".to_string(),
		});
	}
	if config.targets.contains_key(&name) {
		return Err(SyncError::Config {
			message: format!("Target '{}' already exists, use \"edit\" to change it", name),
		});
	}

	config.targets.insert(
		name,
		TargetConfig {
			local_root: PathBuf::from(local_root),
			remote_uri,
			access_key: none_if_empty(access_key),
			secret_key: none_if_empty(secret_key),
			region: none_if_empty(region),
		},
	);
	config.save(config_path).await
}

/// Interactively change an existing target, empty answers keep the
/// current values
pub async fn edit_command(
	config_path: &Path,
	mut config: AppConfig,
	name: &str,
) -> Result<(), SyncError> {
	if config.targets.is_empty() {
		info!("You have not added any targets yet");
		info!("Use the \"add\" command to do this");
		return Ok(());
	}
	let current = config.target(name)?.clone();

	let current_root = current.local_root.display().to_string();
	let local_root = util::prompt("Local folder", Some(&current_root))?;
	let remote_uri = util::prompt("Remote URI", Some(&current.remote_uri))?;
	let access_key = util::prompt("Access key", current.access_key.as_deref())?;
	let secret_input = util::prompt_secret("Secret key (blank to keep)")?;
	let region = util::prompt("Region", current.region.as_deref())?;

	config.targets.insert(
		name.to_string(),
		TargetConfig {
			local_root: PathBuf::from(local_root),
			remote_uri,
			access_key: none_if_empty(access_key),
			secret_key: if secret_input.is_empty() {
				current.secret_key
			} else {
				Some(secret_input)
			},
			region: none_if_empty(region),
		},
	);
	config.save(config_path).await
}

/// Remove a target from the configuration
pub async fn rm_command(
	config_path: &Path,
	mut config: AppConfig,
	name: &str,
) -> Result<(), SyncError> {
	if config.targets.is_empty() {
		info!("You have not added any targets yet");
		return Ok(());
	}
	config.target(name)?;
	config.targets.remove(name);
	config.save(config_path).await
}

/// Print every configured target with its two replica locations
pub fn targets_command(config: &AppConfig) {
	for (name, target) in &config.targets {
		println!("{}: [{} <=> {}]", name, target.local_root.display(), target.remote_uri);
	}
}

/// Sort column and display cell for one side of a key
fn ls_cell(action: &Action) -> (Option<Timestamp>, String) {
	match action.kind {
		ActionKind::Deleted => (None, "<deleted>".to_string()),
		_ => match action.timestamp {
			Some(t) => (Some(t), format_timestamp(Some(t))),
			None => (None, String::new()),
		},
	}
}

fn print_table(rows: &[[String; 3]]) {
	let headers = ["key", "local", "remote"];
	let mut widths = [headers[0].len(), headers[1].len(), headers[2].len()];
	for row in rows {
		for i in 0..3 {
			widths[i] = widths[i].max(row[i].len());
		}
	}
	let line = |cells: [&str; 3]| {
		let text = format!(
			"{:<w0$}  {:<w1$}  {:<w2$}",
			cells[0],
			cells[1],
			cells[2],
			w0 = widths[0],
			w1 = widths[1],
			w2 = widths[2]
		);
		println!("{}", text.trim_end());
	};
	line(headers);
	let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
	line([&dashes[0], &dashes[1], &dashes[2]]);
	for row in rows {
		line([&row[0], &row[1], &row[2]]);
	}
}

/// List the keys a target knows about with the timestamps each side
/// last saw. Keys deleted everywhere only show up with `show_all`.
pub async fn ls_command(
	config: &AppConfig,
	name: &str,
	show_all: bool,
	sort_by: &str,
	descending: bool,
) -> Result<(), SyncError> {
	if config.targets.is_empty() {
		info!("You have not added any targets yet");
		info!("Use the \"add\" command to do this");
		return Ok(());
	}
	let target = config.target(name)?;
	let (mut local, mut remote) = daemon::endpoint_pair(target).await?;

	let mut keys: BTreeSet<String> = local.list_keys().await?;
	keys.extend(remote.list_keys().await?);

	let mut rows = Vec::new();
	for key in keys {
		let (local_ts, local_cell) = ls_cell(&local.classify(&key).await?);
		let (remote_ts, remote_cell) = ls_cell(&remote.classify(&key).await?);
		if !show_all && local_ts.is_none() && remote_ts.is_none() {
			continue;
		}
		rows.push((key, local_ts, remote_ts, local_cell, remote_cell));
	}

	match sort_by {
		"local" => rows.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0))),
		"remote" => rows.sort_by(|a, b| a.2.cmp(&b.2).then_with(|| a.0.cmp(&b.0))),
		_ => {}
	}
	if descending {
		rows.reverse();
	}

	let table: Vec<[String; 3]> = rows
		.into_iter()
		.map(|(key, _, _, local_cell, remote_cell)| [key, local_cell, remote_cell])
		.collect();
	print_table(&table);
	Ok(())
}

/// Reconcile the named targets once, or all of them when none are named
pub async fn sync_command(config: &AppConfig, names: &[String]) -> Result<(), SyncError> {
	let selected = config.select(names)?;
	let mut failed = 0;
	for (name, target) in &selected {
		if let Err(e) = daemon::sync_target(name, target).await {
			error!("Sync failed for '{}': {}", name, e);
			failed += 1;
		}
	}
	if failed > 0 {
		return Err(SyncError::Other {
			message: format!("{} of {} targets failed", failed, selected.len()),
		});
	}
	Ok(())
}

/// Keep the named targets in sync until interrupted
pub async fn daemon_command(
	config: &AppConfig,
	names: &[String],
	debounce: Duration,
	terminator: Terminator,
) -> Result<(), SyncError> {
	if config.targets.is_empty() {
		info!("No targets available");
		info!("Use \"add\" command first");
		return Ok(());
	}
	let selected = config.select(names)?;

	let mut handles = Vec::with_capacity(selected.len());
	for (name, target) in selected {
		let worker = SyncWorker::new(name, target, debounce, terminator.clone());
		handles.push(tokio::spawn(async move { worker.run().await }));
	}
	tokio::select! {
		_ = future::join_all(handles) => {}
		_ = signal::ctrl_c() => info!("Quitting due to keyboard interrupt"),
	}
	Ok(())
}

// vim: ts=4
