//! Core data types shared across the crate

use chrono::{TimeZone, Utc};

/// Seconds since the Unix epoch, UTC.
///
/// Whole seconds only: filesystem mtimes are truncated on read so that a
/// stamped mtime and a stored attribute always compare equal after a
/// round trip between replicas.
pub type Timestamp = i64;

/// One object's content as transferred between replicas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncObject {
	pub data: Vec<u8>,
	/// Content modification instant on the replica it was read from
	pub timestamp: Timestamp,
}

impl SyncObject {
	pub fn new(data: Vec<u8>, timestamp: Timestamp) -> Self {
		SyncObject { data, timestamp }
	}
}

/// Current wall-clock time as a [`Timestamp`]
pub fn now_timestamp() -> Timestamp {
	Utc::now().timestamp()
}

/// Render an optional recorded timestamp for tables and log lines
pub fn format_timestamp(ts: Option<Timestamp>) -> String {
	match ts {
		Some(t) => match Utc.timestamp_opt(t, 0).single() {
			Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
			None => format!("@{}", t),
		},
		None => "-".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_format_timestamp_some() {
		assert_eq!(format_timestamp(Some(0)), "1970-01-01 00:00:00");
		assert_eq!(format_timestamp(Some(1_700_000_000)), "2023-11-14 22:13:20");
	}

	#[test]
	fn test_format_timestamp_none() {
		assert_eq!(format_timestamp(None), "-");
	}
}

// vim: ts=4
