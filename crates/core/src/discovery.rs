//! Finds the one debuggable YouTube video tab.
//!
//! Chromium started with `--remote-debugging-port` lists its targets as JSON
//! at `http://localhost:<port>/json`. [`select_tab`] applies the selection
//! rules to such a listing; [`HttpTabSource`] fetches it.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use ytctl_protocol::TargetInfo;

use crate::error::StartupError;

/// The tab the dispatcher should connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabDescriptor {
	pub url: String,
	pub debug_endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryFailure {
	/// The DevTools HTTP endpoint did not answer (browser not started with
	/// remote debugging, wrong port, …).
	#[error("remote debugging endpoint unreachable: {reason}")]
	Unreachable { reason: String },

	/// No matching video tab. `site_open` tells whether the site itself is
	/// open in some tab, just not on a video.
	#[error("no video tab found")]
	NoTabFound { site_open: bool },

	#[error("{count} video tabs are open")]
	AmbiguousTabs { count: usize },
}

/// URL rules a tab must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabFilter {
	pub site: String,
	pub watch_marker: String,
}

impl TabFilter {
	fn on_site(&self, target: &TargetInfo) -> bool {
		target.is_page() && target.url.contains(&self.site)
	}

	fn is_video(&self, target: &TargetInfo) -> bool {
		target.url.contains(&self.watch_marker) && target.web_socket_debugger_url.is_some()
	}
}

/// Applies the selection rules to one listing: exactly one video tab wins.
pub fn select_tab(targets: &[TargetInfo], filter: &TabFilter) -> Result<TabDescriptor, DiscoveryFailure> {
	let site_tabs: Vec<&TargetInfo> = targets.iter().filter(|t| filter.on_site(t)).collect();
	let mut videos = site_tabs.iter().filter(|t| filter.is_video(t));

	match (videos.next(), videos.next()) {
		(None, _) => Err(DiscoveryFailure::NoTabFound {
			site_open: !site_tabs.is_empty(),
		}),
		(Some(tab), None) => Ok(TabDescriptor {
			url: tab.url.clone(),
			debug_endpoint: tab.web_socket_debugger_url.clone().unwrap_or_default(),
		}),
		(Some(_), Some(_)) => Err(DiscoveryFailure::AmbiguousTabs {
			count: 2 + videos.count(),
		}),
	}
}

/// Something that can be polled for the target tab.
///
/// Implementations must be side-effect free so the dispatcher can call
/// [`discover`](TabSource::discover) in a loop.
#[async_trait]
pub trait TabSource: Send + Sync {
	async fn discover(&self) -> Result<TabDescriptor, DiscoveryFailure>;
}

/// Polls the DevTools `/json` listing over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTabSource {
	client: reqwest::Client,
	url: String,
	filter: TabFilter,
}

impl HttpTabSource {
	pub fn new(url: impl Into<String>, filter: TabFilter, timeout: Duration) -> Result<Self, StartupError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| StartupError::HttpClient(e.to_string()))?;
		Ok(Self {
			client,
			url: url.into(),
			filter,
		})
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	/// Fetches the raw target listing.
	pub async fn list_targets(&self) -> Result<Vec<TargetInfo>, DiscoveryFailure> {
		let unreachable = |reason: String| DiscoveryFailure::Unreachable { reason };

		let response = self
			.client
			.get(&self.url)
			.send()
			.await
			.map_err(|e| unreachable(e.to_string()))?;

		if !response.status().is_success() {
			return Err(unreachable(format!("unexpected status {}", response.status())));
		}

		response
			.json::<Vec<TargetInfo>>()
			.await
			.map_err(|e| unreachable(format!("failed to parse target listing: {e}")))
	}
}

#[async_trait]
impl TabSource for HttpTabSource {
	async fn discover(&self) -> Result<TabDescriptor, DiscoveryFailure> {
		let targets = self.list_targets().await?;
		debug!(target = "ytctl.discovery", url = %self.url, targets = targets.len(), "fetched target listing");
		select_tab(&targets, &self.filter)
	}
}
