//! Two-phase reconciliation engine
//!
//! Phase 1 plans: the union of both replicas' keys is classified on each
//! side independently and folded through a decision table into at most one
//! deferred operation per key. Any combination the table does not cover is
//! a conflict, and the whole cycle aborts before anything is touched.
//!
//! Phase 2 applies: each planned operation executes in isolation. A failing
//! key is logged and skipped, leaving its index entry stale so it is
//! reclassified and retried next cycle; sibling keys proceed unaffected.
//! Both indexes are flushed once afterwards, and only when at least one
//! operation was planned, so an already-converged cycle costs no I/O.

use std::collections::BTreeMap;

use crate::endpoint::{Action, ActionKind, Endpoint};
use crate::error::{EndpointError, SyncError};
use crate::logging::*;
use crate::types::{format_timestamp, Timestamp};

/// Counters for one reconciliation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
	/// Operations the plan contained
	pub planned: usize,
	/// Operations that applied cleanly
	pub applied: usize,
	/// Operations that failed and were skipped
	pub failed: usize,
}

/// One deferred operation, decided in Phase 1 and executed in Phase 2.
/// Copies record the decision timestamp on both sides; deletes record it on
/// the side being deleted only, leaving the originating side's entry alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
	CopyAToB { timestamp: Option<Timestamp> },
	CopyBToA { timestamp: Option<Timestamp> },
	DeleteOnA { timestamp: Option<Timestamp> },
	DeleteOnB { timestamp: Option<Timestamp> },
}

/// The decision table. `None` means the key is already converged.
///
/// When exactly one side changed, that side's state is trusted outright.
/// When neither side changed but their recorded timestamps disagree, the
/// index is the tie-breaker (an imported or hand-edited index heals toward
/// the newest recorded value). When both sides changed independently there
/// is no safe automatic resolution, deletions included: a delete racing an
/// update is surfaced, not ordered by time.
fn decide(key: &str, a: Action, b: Action) -> Result<Option<Decision>, SyncError> {
	use ActionKind::*;

	let decision = match (a.kind, b.kind) {
		(NoChange, NoChange) => {
			if a.timestamp == b.timestamp {
				return Ok(None);
			}
			match (a.timestamp, b.timestamp) {
				(None, Some(_)) => Some(Decision::CopyBToA { timestamp: b.timestamp }),
				(Some(_), None) => Some(Decision::CopyAToB { timestamp: a.timestamp }),
				(Some(ta), Some(tb)) if ta > tb => {
					Some(Decision::CopyAToB { timestamp: a.timestamp })
				}
				(Some(_), Some(_)) => Some(Decision::CopyBToA { timestamp: b.timestamp }),
				(None, None) => None,
			}
		}
		(Updated, NoChange) => Some(Decision::CopyAToB { timestamp: a.timestamp }),
		(NoChange, Updated) => Some(Decision::CopyBToA { timestamp: b.timestamp }),
		(Deleted, NoChange) => Some(Decision::DeleteOnB { timestamp: a.timestamp }),
		(NoChange, Deleted) => Some(Decision::DeleteOnA { timestamp: b.timestamp }),
		(Deleted, Deleted) => None,
		_ => {
			return Err(SyncError::Conflict { key: key.to_string(), left: a, right: b });
		}
	};
	Ok(decision)
}

/// Copy one key, then stage the decision timestamp on both sides
async fn copy(
	src: &mut (dyn Endpoint + Send),
	dst: &mut (dyn Endpoint + Send),
	key: &str,
	timestamp: Option<Timestamp>,
) -> Result<(), EndpointError> {
	info!("Updating {} on {} from {}", key, dst.uri(), src.uri());
	let object = src.read(key).await?;
	dst.write(key, &object).await?;
	dst.record_sync_timestamp(key, timestamp);
	src.record_sync_timestamp(key, timestamp);
	Ok(())
}

/// Delete one key, then stage the deletion timestamp on that side only
async fn remove(
	endpoint: &mut (dyn Endpoint + Send),
	key: &str,
	timestamp: Option<Timestamp>,
) -> Result<(), EndpointError> {
	info!(
		"Deleting {} on {} (last synced {})",
		key,
		endpoint.uri(),
		format_timestamp(timestamp)
	);
	endpoint.delete(key).await?;
	endpoint.record_sync_timestamp(key, timestamp);
	Ok(())
}

/// One convergence cycle between two replicas.
///
/// Phase 1 errors (listing, classification, conflicts) escape before any
/// operation runs. Phase 2 failures are contained per key. Re-invoking on
/// an already-converged pair plans nothing and performs no content I/O.
pub async fn reconcile(
	a: &mut (dyn Endpoint + Send),
	b: &mut (dyn Endpoint + Send),
) -> Result<CycleReport, SyncError> {
	let keys_a = a.list_keys().await?;
	let keys_b = b.list_keys().await?;

	let mut plan: BTreeMap<String, Decision> = BTreeMap::new();
	for key in keys_a.union(&keys_b) {
		let action_a = a.classify(key).await?;
		let action_b = b.classify(key).await?;
		if let Some(decision) = decide(key, action_a, action_b)? {
			debug!("Planned {:?} for {}", decision, key);
			plan.insert(key.clone(), decision);
		}
	}

	let mut report = CycleReport { planned: plan.len(), ..CycleReport::default() };
	for (key, decision) in &plan {
		let result = match *decision {
			Decision::CopyAToB { timestamp } => copy(a, b, key, timestamp).await,
			Decision::CopyBToA { timestamp } => copy(b, a, key, timestamp).await,
			Decision::DeleteOnA { timestamp } => remove(a, key, timestamp).await,
			Decision::DeleteOnB { timestamp } => remove(b, key, timestamp).await,
		};
		match result {
			Ok(()) => {
				a.commit_index_entry(key);
				b.commit_index_entry(key);
				report.applied += 1;
			}
			Err(e) => {
				error!("Failed to apply {}: {}", key, e);
				report.failed += 1;
			}
		}
	}

	if report.planned > 0 {
		info!("Flushing index to storage");
		a.flush_index().await?;
		b.flush_index().await?;
	} else {
		info!("Nothing to update");
	}
	Ok(report)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn no_change(ts: Option<Timestamp>) -> Action {
		Action::no_change(ts)
	}

	#[test]
	fn test_decide_converged_keys_are_noops() {
		assert_eq!(decide("k", no_change(Some(5)), no_change(Some(5))).unwrap(), None);
		assert_eq!(decide("k", no_change(None), no_change(None)).unwrap(), None);
		assert_eq!(
			decide("k", Action::deleted(Some(5)), Action::deleted(Some(9))).unwrap(),
			None
		);
	}

	#[test]
	fn test_decide_pulls_toward_missing_timestamp() {
		assert_eq!(
			decide("k", no_change(None), no_change(Some(7))).unwrap(),
			Some(Decision::CopyBToA { timestamp: Some(7) })
		);
		assert_eq!(
			decide("k", no_change(Some(7)), no_change(None)).unwrap(),
			Some(Decision::CopyAToB { timestamp: Some(7) })
		);
	}

	#[test]
	fn test_decide_index_is_tie_breaker() {
		assert_eq!(
			decide("k", no_change(Some(9)), no_change(Some(4))).unwrap(),
			Some(Decision::CopyAToB { timestamp: Some(9) })
		);
		assert_eq!(
			decide("k", no_change(Some(4)), no_change(Some(9))).unwrap(),
			Some(Decision::CopyBToA { timestamp: Some(9) })
		);
	}

	#[test]
	fn test_decide_update_pushes_unconditionally() {
		assert_eq!(
			decide("k", Action::updated(100), no_change(Some(999))).unwrap(),
			Some(Decision::CopyAToB { timestamp: Some(100) })
		);
		assert_eq!(
			decide("k", no_change(None), Action::updated(100)).unwrap(),
			Some(Decision::CopyBToA { timestamp: Some(100) })
		);
	}

	#[test]
	fn test_decide_deletion_stamps_the_stale_side() {
		assert_eq!(
			decide("k", Action::deleted(Some(60)), no_change(Some(60))).unwrap(),
			Some(Decision::DeleteOnB { timestamp: Some(60) })
		);
		assert_eq!(
			decide("k", no_change(Some(60)), Action::deleted(Some(60))).unwrap(),
			Some(Decision::DeleteOnA { timestamp: Some(60) })
		);
	}

	#[test]
	fn test_decide_double_update_conflicts() {
		let err = decide("notes.txt", Action::updated(10), Action::updated(20)).unwrap_err();
		match err {
			SyncError::Conflict { key, left, right } => {
				assert_eq!(key, "notes.txt");
				assert_eq!(left, Action::updated(10));
				assert_eq!(right, Action::updated(20));
			}
			other => panic!("expected conflict, got {:?}", other),
		}
	}

	#[test]
	fn test_decide_update_vs_delete_conflicts_regardless_of_order() {
		// A delete older than a concurrent update is still surfaced, never
		// ordered by time.
		assert!(decide("k", Action::updated(100), Action::deleted(Some(50))).is_err());
		assert!(decide("k", Action::deleted(Some(50)), Action::updated(100)).is_err());
		assert!(decide("k", Action::deleted(Some(200)), Action::updated(100)).is_err());
	}
}

// vim: ts=4
