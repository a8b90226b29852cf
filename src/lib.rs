//! # duplexr - 2-way Folder / Object Store Synchronizer
//!
//! duplexr keeps a local directory tree and a remote object store
//! convergent. Each replica carries an index of last-synced timestamps,
//! so every pass can tell apart fresh edits, deletions and untouched
//! entries without comparing content. Planning is separated from
//! application: conflicts abort a pass before anything is written,
//! while per-key apply failures are logged and retried on a later pass.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use duplexr::engine::reconcile;
//! use duplexr::local::LocalEndpoint;
//! use duplexr::remote::RemoteEndpoint;
//! use duplexr::store::DirStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut local = LocalEndpoint::open("/home/me/docs").await?;
//!     let store = DirStore::open("/backup/docs").await?;
//!     let mut remote = RemoteEndpoint::open(Box::new(store)).await?;
//!
//!     let report = reconcile(&mut local, &mut remote).await?;
//!     println!("Applied {} of {} planned operations", report.applied, report.planned);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod daemon;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod index;
pub mod local;
pub mod logging;
pub mod remote;
pub mod store;
pub mod types;
pub mod util;
pub mod watcher;

// Re-export commonly used types and functions
pub use endpoint::{Action, ActionKind, Endpoint};
pub use engine::{reconcile, CycleReport};
pub use error::{EndpointError, SyncError};
pub use index::{IndexEntry, SyncIndex};
pub use local::LocalEndpoint;
pub use remote::RemoteEndpoint;
pub use store::{DirStore, MemStore, ObjectStore};
pub use types::{SyncObject, Timestamp};

// vim: ts=4
