//! Error types that cross the controller boundary.
//!
//! Per-stage failures ([`DiscoveryFailure`](crate::DiscoveryFailure),
//! [`ConnectError`](crate::ConnectError), [`SendError`](crate::SendError)) are
//! handled inside the dispatcher and never reach the caller. What remains here
//! is either fatal at startup or terminates the dispatcher.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised before any core task is running.
#[derive(Debug, Error)]
pub enum StartupError {
	#[error("port {port} is already in use; check that no other program is bound to it")]
	PortInUse {
		port: u16,
		#[source]
		source: std::io::Error,
	},

	#[error("another instance of ytctl is already running")]
	SecondInstance,

	#[error("failed to acquire lock file {}: {source}", path.display())]
	Lock {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to build HTTP client: {0}")]
	HttpClient(String),

	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Catalog(#[from] CatalogError),
}

/// Fatal outcomes of the dispatcher loop.
#[derive(Debug, Error)]
pub enum DispatchError {
	#[error("no YouTube video tab found after {} seconds", elapsed.as_secs())]
	DiscoveryCeilingExceeded { elapsed: Duration },
}

/// Umbrella error for controller operations.
#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Startup(#[from] StartupError),

	#[error(transparent)]
	Dispatch(#[from] DispatchError),

	#[error("{task} task failed: {message}")]
	Task { task: &'static str, message: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),
}
