//! Small shared helpers: file tree walks, atomic writes, interactive prompts

use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use termios::{tcsetattr, Termios, ECHO, TCSANOW};
use tokio::fs as afs;

use crate::endpoint::STATE_DIR;
use crate::logging::*;

/// Suffix for in-flight writes, renamed into place on completion
pub(crate) const TMP_SUFFIX: &str = ".duplexr-tmp";

/// Collect relative keys for every regular file under `root`, skipping the
/// top-level state directory, symlinks and non-UTF-8 names
pub(crate) async fn walk_files(root: &Path) -> io::Result<BTreeSet<String>> {
	let mut keys = BTreeSet::new();
	let mut stack: Vec<(PathBuf, String)> = vec![(root.to_path_buf(), String::new())];

	while let Some((dir, prefix)) = stack.pop() {
		let mut entries = afs::read_dir(&dir).await?;
		while let Some(entry) = entries.next_entry().await? {
			let name = match entry.file_name().into_string() {
				Ok(name) => name,
				Err(raw) => {
					warn!("Skipping non-UTF-8 name {:?} under {}", raw, dir.display());
					continue;
				}
			};
			if prefix.is_empty() && name == STATE_DIR {
				continue;
			}
			let key = if prefix.is_empty() { name } else { format!("{}/{}", prefix, name) };
			let file_type = entry.file_type().await?;
			if file_type.is_dir() {
				stack.push((entry.path(), key));
			} else if file_type.is_file() {
				keys.insert(key);
			} else {
				debug!("Skipping non-regular file {}", entry.path().display());
			}
		}
	}
	Ok(keys)
}

/// Write a file through a temp sibling and rename it into place. The temp
/// file lives in the same directory so the rename cannot cross filesystems.
/// When `mtime` is given it is stamped before the rename, so content and
/// timestamp become visible in one step.
pub(crate) async fn atomic_write(
	path: &Path,
	data: &[u8],
	mtime: Option<i64>,
) -> io::Result<()> {
	let name = path
		.file_name()
		.and_then(|n| n.to_str())
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
	let tmp = path.with_file_name(format!("{}{}", name, TMP_SUFFIX));
	afs::write(&tmp, data).await?;
	if let Some(secs) = mtime {
		filetime::set_file_mtime(&tmp, filetime::FileTime::from_unix_time(secs, 0))?;
	}
	afs::rename(&tmp, path).await?;
	Ok(())
}

// Restores the terminal line settings on drop
struct EchoGuard {
	fd: i32,
	original: Termios,
}

impl EchoGuard {
	fn new() -> Option<Self> {
		let fd = 0; // stdin
		let original = match Termios::from_fd(fd) {
			Ok(term) => term,
			Err(_) => return None, // Not a terminal
		};
		let mut muted = original;
		muted.c_lflag &= !ECHO;
		if tcsetattr(fd, TCSANOW, &muted).is_err() {
			return None;
		}
		Some(EchoGuard { fd, original })
	}
}

impl Drop for EchoGuard {
	fn drop(&mut self) {
		let _ = tcsetattr(self.fd, TCSANOW, &self.original);
	}
}

fn read_line() -> io::Result<String> {
	let mut line = String::new();
	io::stdin().lock().read_line(&mut line)?;
	Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Prompt for one line of input. Empty input falls back to `default`
/// when one is given.
pub fn prompt(label: &str, default: Option<&str>) -> io::Result<String> {
	match default {
		Some(d) if !d.is_empty() => print!("{} [{}]: ", label, d),
		_ => print!("{}: ", label),
	}
	io::stdout().flush()?;
	let line = read_line()?;
	if line.is_empty() {
		if let Some(d) = default {
			return Ok(d.to_string());
		}
	}
	Ok(line)
}

/// Prompt for a secret with terminal echo disabled. Falls back to a plain
/// prompt when stdin is not a terminal (piped input, tests).
pub fn prompt_secret(label: &str) -> io::Result<String> {
	print!("{}: ", label);
	io::stdout().flush()?;
	let guard = EchoGuard::new();
	let line = read_line();
	let suppressed = guard.is_some();
	drop(guard);
	if suppressed {
		// The user's Enter was swallowed along with the secret.
		println!();
	}
	line
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_atomic_write_creates_and_replaces() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("doc.txt");
		atomic_write(&path, b"first", None).await.unwrap();
		assert_eq!(std::fs::read(&path).unwrap(), b"first");
		atomic_write(&path, b"second", None).await.unwrap();
		assert_eq!(std::fs::read(&path).unwrap(), b"second");
		// No temp leftovers.
		let names: Vec<_> = std::fs::read_dir(dir.path())
			.unwrap()
			.map(|e| e.unwrap().file_name().into_string().unwrap())
			.collect();
		assert_eq!(names, vec!["doc.txt".to_string()]);
	}

	#[tokio::test]
	async fn test_atomic_write_stamps_mtime() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("doc.txt");
		atomic_write(&path, b"data", Some(1_000_000)).await.unwrap();
		let meta = std::fs::metadata(&path).unwrap();
		let mtime = filetime::FileTime::from_last_modification_time(&meta);
		assert_eq!(mtime.unix_seconds(), 1_000_000);
	}
}

// vim: ts=4
