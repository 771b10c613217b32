//! Single-instance guard.
//!
//! An exclusive advisory `flock(2)` on a lock file holding our PID. The lock
//! dies with the process, so a crash never leaves a stale guard behind; the
//! file itself is removed when the guard drops.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;
use ytctl::StartupError;

/// Lock file used when none is configured.
pub fn default_lock_path() -> PathBuf {
	dirs::runtime_dir()
		.or_else(dirs::cache_dir)
		.unwrap_or_else(std::env::temp_dir)
		.join("ytctl.lock")
}

pub struct InstanceGuard {
	path: PathBuf,
	_file: File,
}

impl InstanceGuard {
	/// Takes the lock or fails with [`StartupError::SecondInstance`].
	pub fn acquire(path: &Path) -> Result<Self, StartupError> {
		let lock_err = |source| StartupError::Lock {
			path: path.to_path_buf(),
			source,
		};

		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent).map_err(lock_err)?;
		}

		let mut file = open_exclusive(path)?;
		file.set_len(0).map_err(lock_err)?;
		writeln!(file, "{}", std::process::id()).map_err(lock_err)?;

		debug!(target = "ytctl.instance", path = %path.display(), "lock acquired");
		Ok(Self {
			path: path.to_path_buf(),
			_file: file,
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl Drop for InstanceGuard {
	fn drop(&mut self) {
		// Unlink while still holding the lock; the flock goes with the fd.
		let _ = std::fs::remove_file(&self.path);
	}
}

#[cfg(unix)]
fn open_exclusive(path: &Path) -> Result<File, StartupError> {
	use std::os::unix::io::AsRawFd;

	let file = OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(false)
		.open(path)
		.map_err(|source| StartupError::Lock {
			path: path.to_path_buf(),
			source,
		})?;

	// SAFETY: flock is safe to call with a valid file descriptor
	let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
	if result != 0 {
		let err = std::io::Error::last_os_error();
		return if err.kind() == std::io::ErrorKind::WouldBlock {
			Err(StartupError::SecondInstance)
		} else {
			Err(StartupError::Lock {
				path: path.to_path_buf(),
				source: err,
			})
		};
	}
	Ok(file)
}

#[cfg(not(unix))]
fn open_exclusive(path: &Path) -> Result<File, StartupError> {
	OpenOptions::new()
		.write(true)
		.create_new(true)
		.open(path)
		.map_err(|source| match source.kind() {
			std::io::ErrorKind::AlreadyExists => StartupError::SecondInstance,
			_ => StartupError::Lock {
				path: path.to_path_buf(),
				source,
			},
		})
}
