//! Error types for duplexr operations

use std::error::Error;
use std::fmt;
use std::io;

use crate::endpoint::Action;

/// Errors raised by a single replica endpoint
#[derive(Debug)]
pub enum EndpointError {
	/// I/O failure against the replica's backing storage
	Io(io::Error),

	/// Key is empty, absolute, escapes the replica root, or is reserved
	InvalidKey { key: String },

	/// Object expected to exist was not found
	MissingObject { key: String },

	/// Object store operation failed
	Store { message: String },

	/// Index document failed to load or parse
	IndexCorrupted { message: String },

	/// Timestamp attribute missing or unparsable
	BadTimestamp { key: String, value: String },
}

impl fmt::Display for EndpointError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EndpointError::Io(e) => write!(f, "I/O error: {}", e),
			EndpointError::InvalidKey { key } => {
				write!(f, "Invalid key: '{}'", key)
			}
			EndpointError::MissingObject { key } => {
				write!(f, "No such object: '{}'", key)
			}
			EndpointError::Store { message } => {
				write!(f, "Object store error: {}", message)
			}
			EndpointError::IndexCorrupted { message } => {
				write!(f, "Index corrupted: {}", message)
			}
			EndpointError::BadTimestamp { key, value } => {
				write!(f, "Bad timestamp attribute on '{}': '{}'", key, value)
			}
		}
	}
}

impl Error for EndpointError {}

impl From<io::Error> for EndpointError {
	fn from(e: io::Error) -> Self {
		EndpointError::Io(e)
	}
}

/// Main error type for reconciliation, daemon and command operations
#[derive(Debug)]
pub enum SyncError {
	/// Both replicas changed the same key; the whole cycle is aborted
	Conflict { key: String, left: Action, right: Action },

	/// Replica-level failure (nested)
	Endpoint(EndpointError),

	/// Invalid or missing configuration
	Config { message: String },

	/// Unknown sync target name
	UnknownTarget { name: String, choices: Vec<String> },

	/// Filesystem watch failure
	Watch { message: String },

	/// I/O error
	Io(io::Error),

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Conflict { key, left, right } => {
				write!(
					f,
					"Unresolved conflict on '{}' ({} vs {}), aborting before anything is updated",
					key, left, right
				)
			}
			SyncError::Endpoint(e) => write!(f, "Endpoint error: {}", e),
			SyncError::Config { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::UnknownTarget { name, choices } => {
				write!(f, "'{}' is an unknown target. Choices are: {}", name, choices.join(", "))
			}
			SyncError::Watch { message } => {
				write!(f, "Watch error: {}", message)
			}
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<EndpointError> for SyncError {
	fn from(e: EndpointError) -> Self {
		SyncError::Endpoint(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

// vim: ts=4
