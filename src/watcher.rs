//! Recursive directory watching built on inotify
//!
//! inotify watches single directories, so covering a tree means one
//! watch per directory: installed up front by [`RecursiveWatcher::add_watches`]
//! and extended by the caller whenever an event announces a new
//! directory. The watcher owns the handle -> path arena needed to
//! resolve event names back to full paths.

use libc::{c_char, c_int, c_void};
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::time;

use crate::error::SyncError;
use crate::logging::*;

// Event bits from linux/inotify.h
pub const IN_MODIFY: u32 = 0x00000002;
pub const IN_ATTRIB: u32 = 0x00000004;
pub const IN_MOVED_FROM: u32 = 0x00000040;
pub const IN_MOVED_TO: u32 = 0x00000080;
pub const IN_CREATE: u32 = 0x00000100;
pub const IN_DELETE: u32 = 0x00000200;
pub const IN_Q_OVERFLOW: u32 = 0x00004000;
pub const IN_IGNORED: u32 = 0x00008000;
pub const IN_ISDIR: u32 = 0x40000000;

const IN_CLOEXEC: c_int = 0o2000000;
const IN_NONBLOCK: c_int = 0o0004000;

/// Everything a sync cycle cares about. IN_ATTRIB is included because
/// a bare touch changes the modification time without writing data.
pub const WATCH_MASK: u32 =
	IN_CREATE | IN_DELETE | IN_MODIFY | IN_ATTRIB | IN_MOVED_FROM | IN_MOVED_TO;

#[repr(C)]
struct InotifyEvent {
	wd: c_int,
	mask: u32,
	cookie: u32,
	len: u32,
	// name bytes follow, NUL padded to len
}

extern "C" {
	fn inotify_init1(flags: c_int) -> c_int;
	fn inotify_add_watch(fd: c_int, pathname: *const c_char, mask: u32) -> c_int;
}

/// A single filesystem change notification
#[derive(Debug, Clone)]
pub struct WatchEvent {
	/// Handle of the watched directory the change happened under
	pub wd: i32,
	/// Raw inotify mask bits
	pub mask: u32,
	/// Name of the affected entry, relative to the watched directory
	pub name: Option<String>,
}

impl WatchEvent {
	/// True when the event announces a directory new to the tree,
	/// created in place or moved in from elsewhere. Such directories
	/// need watches of their own.
	pub fn creates_directory(&self) -> bool {
		self.mask & IN_ISDIR != 0 && self.mask & (IN_CREATE | IN_MOVED_TO) != 0
	}
}

/// Watches a directory tree through a single inotify instance
pub struct RecursiveWatcher {
	fd: AsyncFd<OwnedFd>,
	watches: HashMap<i32, PathBuf>,
	read_timeout: Duration,
}

impl RecursiveWatcher {
	/// Create an inotify instance. `read_timeout` bounds how long
	/// [`read`](Self::read) waits for the first event of a batch.
	pub fn new(read_timeout: Duration) -> Result<Self, SyncError> {
		let raw = unsafe { inotify_init1(IN_CLOEXEC | IN_NONBLOCK) };
		if raw < 0 {
			return Err(SyncError::Watch {
				message: format!("inotify_init1 failed: {}", io::Error::last_os_error()),
			});
		}
		let owned = unsafe { OwnedFd::from_raw_fd(raw) };
		let fd = AsyncFd::new(owned).map_err(|e| SyncError::Watch {
			message: format!("Failed to register inotify fd: {}", e),
		})?;
		Ok(RecursiveWatcher {
			fd,
			watches: HashMap::new(),
			read_timeout,
		})
	}

	/// Install a watch on `root` and on every directory currently
	/// below it. Returns the handle -> path entries added by this
	/// call; they also accumulate in the watcher, so repeated calls
	/// extend coverage as the tree grows.
	///
	/// A failure on `root` itself is an error. Descendants that cannot
	/// be watched (typically removed mid-walk) are logged and skipped.
	pub fn add_watches(
		&mut self,
		root: &Path,
		mask: u32,
	) -> Result<HashMap<i32, PathBuf>, SyncError> {
		let mut added = HashMap::new();
		let root_wd = self.install(root, mask)?;
		added.insert(root_wd, root.to_path_buf());

		let mut stack = vec![root.to_path_buf()];
		while let Some(dir) = stack.pop() {
			let entries = match std::fs::read_dir(&dir) {
				Ok(entries) => entries,
				Err(e) => {
					warn!("Cannot list {}: {}", dir.display(), e);
					continue;
				}
			};
			for entry in entries.flatten() {
				// Plain directories only, symlinks stay unwatched
				let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
				if !is_dir {
					continue;
				}
				let path = entry.path();
				match self.install(&path, mask) {
					Ok(wd) => {
						added.insert(wd, path.clone());
						stack.push(path);
					}
					Err(e) => warn!("Skipping watch on {}: {}", path.display(), e),
				}
			}
		}
		Ok(added)
	}

	fn install(&mut self, dir: &Path, mask: u32) -> Result<i32, SyncError> {
		let path_c = CString::new(dir.as_os_str().as_bytes()).map_err(|e| SyncError::Watch {
			message: format!("Invalid watch path {}: {}", dir.display(), e),
		})?;
		let wd = unsafe {
			inotify_add_watch(self.fd.get_ref().as_raw_fd(), path_c.as_ptr(), mask)
		};
		if wd < 0 {
			return Err(SyncError::Watch {
				message: format!(
					"Failed to watch {}: {}",
					dir.display(),
					io::Error::last_os_error()
				),
			});
		}
		debug!("Watching {} (wd {})", dir.display(), wd);
		self.watches.insert(wd, dir.to_path_buf());
		Ok(wd)
	}

	/// Wait for filesystem activity and drain the pending event queue.
	///
	/// Blocks until at least one event arrives or the read timeout
	/// elapses; a quiet period yields an empty batch.
	pub async fn read(&mut self) -> Result<Vec<WatchEvent>, SyncError> {
		let mut guard = match time::timeout(self.read_timeout, self.fd.readable()).await {
			Ok(ready) => ready.map_err(|e| SyncError::Watch {
				message: format!("inotify poll failed: {}", e),
			})?,
			Err(_) => return Ok(Vec::new()),
		};

		// Drain raw bytes first; the guard borrows the fd, so parsing
		// (which may drop watches from the arena) happens afterwards.
		let mut data = Vec::new();
		let mut buf = [0u8; 4096];
		loop {
			let read = guard.try_io(|inner| {
				let n = unsafe {
					libc::read(
						inner.get_ref().as_raw_fd(),
						buf.as_mut_ptr() as *mut c_void,
						buf.len(),
					)
				};
				if n < 0 {
					Err(io::Error::last_os_error())
				} else {
					Ok(n as usize)
				}
			});
			match read {
				Ok(Ok(0)) => break,
				Ok(Ok(n)) => data.extend_from_slice(&buf[..n]),
				Ok(Err(e)) => {
					return Err(SyncError::Watch {
						message: format!("inotify read failed: {}", e),
					})
				}
				// Readiness was consumed, nothing more pending
				Err(_would_block) => break,
			}
		}
		drop(guard);

		let mut events = Vec::new();
		self.parse_events(&data, &mut events);
		Ok(events)
	}

	fn parse_events(&mut self, buf: &[u8], out: &mut Vec<WatchEvent>) {
		let header = std::mem::size_of::<InotifyEvent>();
		let mut offset = 0;
		while offset + header <= buf.len() {
			// The buffer has no alignment guarantee, copy the header out
			let event: InotifyEvent =
				unsafe { std::ptr::read_unaligned(buf.as_ptr().add(offset) as *const InotifyEvent) };
			let total = header + event.len as usize;
			if offset + total > buf.len() {
				break;
			}
			let name_offset = offset + header;
			offset += total;

			if event.mask & IN_Q_OVERFLOW != 0 {
				warn!("Event queue overflowed, some changes may have been missed");
				continue;
			}
			if event.mask & IN_IGNORED != 0 {
				// Kernel dropped the watch, usually a removed directory
				self.watches.remove(&event.wd);
				continue;
			}
			let name = if event.len > 0 {
				let raw = unsafe {
					CStr::from_ptr(buf.as_ptr().add(name_offset) as *const c_char)
				};
				let name = raw.to_string_lossy().into_owned();
				if name.is_empty() {
					None
				} else {
					Some(name)
				}
			} else {
				None
			};
			out.push(WatchEvent {
				wd: event.wd,
				mask: event.mask,
				name,
			});
		}
	}

	/// Resolve a watch handle to the directory it covers
	pub fn path_for(&self, wd: i32) -> Option<&Path> {
		self.watches.get(&wd).map(PathBuf::as_path)
	}

	/// Full path of the entry an event refers to, when the handle is
	/// still known
	pub fn event_path(&self, event: &WatchEvent) -> Option<PathBuf> {
		let dir = self.watches.get(&event.wd)?;
		Some(match &event.name {
			Some(name) => dir.join(name),
			None => dir.clone(),
		})
	}

	/// Number of directories currently watched
	pub fn watch_count(&self) -> usize {
		self.watches.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_creates_directory_mask() {
		let ev = WatchEvent {
			wd: 1,
			mask: IN_CREATE | IN_ISDIR,
			name: Some("sub".into()),
		};
		assert!(ev.creates_directory());

		let ev = WatchEvent {
			wd: 1,
			mask: IN_CREATE,
			name: Some("file.txt".into()),
		};
		assert!(!ev.creates_directory());

		let ev = WatchEvent {
			wd: 1,
			mask: IN_MOVED_TO | IN_ISDIR,
			name: Some("sub".into()),
		};
		assert!(ev.creates_directory());

		let ev = WatchEvent {
			wd: 1,
			mask: IN_DELETE | IN_ISDIR,
			name: Some("sub".into()),
		};
		assert!(!ev.creates_directory());
	}
}

// vim: ts=4
