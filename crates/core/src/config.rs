//! Controller configuration.
//!
//! Defaults reproduce the fixed constants of the control protocol (control
//! port 65432, DevTools port 9222, 5 second skips, …). A JSON file can
//! override any subset; durations are written in milliseconds.

use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discovery::{DiscoveryFailure, TabFilter};
use crate::queue::Params;

pub const DEFAULT_CONTROL_PORT: u16 = 65432;
pub const DEFAULT_DEBUG_PORT: u16 = 9222;
pub const DEFAULT_SKIP_SECONDS: u32 = 5;
/// Skip lengths the operator can switch between while running.
pub const SKIP_SECONDS_OPTIONS: [u32; 4] = [5, 10, 30, 60];

/// Parameter name the skip commands read.
pub const SKIP_SECONDS_PARAM: &str = "skip_seconds";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config {}: {source}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config {}: {source}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("invalid config: {0}")]
	Invalid(String),

	#[error("skip length must be one of 5, 10, 30 or 60 seconds, got {0}")]
	UnsupportedSkip(u32),
}

/// Accepts a runtime skip length if it is one of [`SKIP_SECONDS_OPTIONS`].
pub fn check_skip_seconds(seconds: u32) -> Result<u32, ConfigError> {
	if SKIP_SECONDS_OPTIONS.contains(&seconds) {
		Ok(seconds)
	} else {
		Err(ConfigError::UnsupportedSkip(seconds))
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
	/// Loopback port the IPC listener binds.
	pub control_port: u16,
	/// Port of the browser's remote-debugging HTTP endpoint.
	pub debug_port: u16,
	/// Full target listing URL; derived from `debug_port` when unset.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub discovery_url: Option<String>,
	/// Substring a tab URL must contain to belong to the site.
	pub site: String,
	/// Substring marking a video watch page.
	pub watch_marker: String,
	pub skip_seconds: u32,
	/// Directory whose `.js` files override the bundled command scripts.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub scripts_dir: Option<PathBuf>,
	pub timings: Timings,
}

impl Default for ControllerConfig {
	fn default() -> Self {
		Self {
			control_port: DEFAULT_CONTROL_PORT,
			debug_port: DEFAULT_DEBUG_PORT,
			discovery_url: None,
			site: "youtube.com".to_string(),
			watch_marker: "/watch?v=".to_string(),
			skip_seconds: DEFAULT_SKIP_SECONDS,
			scripts_dir: None,
			timings: Timings::default(),
		}
	}
}

impl ControllerConfig {
	/// Default config file location (`$XDG_CONFIG_HOME/ytctl/config.json`).
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join("ytctl").join("config.json"))
	}

	/// Reads and validates a JSON config file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})?;
		config.validate()?;
		Ok(config)
	}

	/// Loads the default config file if it exists, defaults otherwise.
	pub fn load_or_default() -> Result<Self, ConfigError> {
		match Self::default_path() {
			Some(path) if path.is_file() => Self::load(&path),
			_ => Ok(Self::default()),
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.skip_seconds == 0 {
			return Err(ConfigError::Invalid("skip_seconds must be at least 1".into()));
		}
		if self.site.trim().is_empty() {
			return Err(ConfigError::Invalid("site pattern must not be empty".into()));
		}
		if self.watch_marker.trim().is_empty() {
			return Err(ConfigError::Invalid("watch_marker must not be empty".into()));
		}
		if self.timings.connect_timeout.is_zero() {
			return Err(ConfigError::Invalid("connect_timeout_ms must be positive".into()));
		}
		Ok(())
	}

	pub fn control_addr(&self) -> SocketAddr {
		SocketAddr::from((Ipv4Addr::LOCALHOST, self.control_port))
	}

	pub fn discovery_url(&self) -> String {
		self.discovery_url
			.clone()
			.unwrap_or_else(|| format!("http://localhost:{}/json", self.debug_port))
	}

	pub fn tab_filter(&self) -> TabFilter {
		TabFilter {
			site: self.site.clone(),
			watch_marker: self.watch_marker.clone(),
		}
	}

	/// Process-wide parameters merged into every command at dispatch time.
	pub fn dispatch_params(&self) -> Params {
		let mut params = Params::new();
		params.insert(SKIP_SECONDS_PARAM.to_string(), self.skip_seconds.into());
		params
	}
}

/// Every wait and timeout the controller uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
	#[serde(rename = "connect_timeout_ms", with = "duration_ms")]
	pub connect_timeout: Duration,
	/// Wait after a connect timeout before rediscovering.
	#[serde(rename = "connect_timeout_retry_ms", with = "duration_ms")]
	pub connect_timeout_retry: Duration,
	/// Wait after any other connect error before rediscovering.
	#[serde(rename = "connect_error_retry_ms", with = "duration_ms")]
	pub connect_error_retry: Duration,
	#[serde(rename = "no_tab_retry_ms", with = "duration_ms")]
	pub no_tab_retry: Duration,
	#[serde(rename = "ambiguous_retry_ms", with = "duration_ms")]
	pub ambiguous_retry: Duration,
	#[serde(rename = "unreachable_retry_ms", with = "duration_ms")]
	pub unreachable_retry: Duration,
	/// Longest a single discovery phase may last before the process gives up.
	#[serde(rename = "discovery_ceiling_ms", with = "duration_ms")]
	pub discovery_ceiling: Duration,
	#[serde(rename = "http_timeout_ms", with = "duration_ms")]
	pub http_timeout: Duration,
	/// Bound on the single read of an IPC connection.
	#[serde(rename = "ipc_read_timeout_ms", with = "duration_ms")]
	pub ipc_read_timeout: Duration,
}

impl Default for Timings {
	fn default() -> Self {
		Self {
			connect_timeout: Duration::from_secs(5),
			connect_timeout_retry: Duration::from_secs(1),
			connect_error_retry: Duration::from_secs(5),
			no_tab_retry: Duration::from_secs(2),
			ambiguous_retry: Duration::from_secs(5),
			unreachable_retry: Duration::from_secs(5),
			discovery_ceiling: Duration::from_secs(600),
			http_timeout: Duration::from_secs(10),
			ipc_read_timeout: Duration::from_secs(1),
		}
	}
}

impl Timings {
	/// Wait before polling discovery again after `failure`.
	pub fn discovery_retry(&self, failure: &DiscoveryFailure) -> Duration {
		match failure {
			DiscoveryFailure::NoTabFound { .. } => self.no_tab_retry,
			DiscoveryFailure::AmbiguousTabs { .. } => self.ambiguous_retry,
			DiscoveryFailure::Unreachable { .. } => self.unreachable_retry,
		}
	}
}

mod duration_ms {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}
