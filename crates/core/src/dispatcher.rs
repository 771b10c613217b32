//! The dispatcher: the only consumer of the command queue and the only owner
//! of the connection.
//!
//! ```text
//!            ┌──────────── failure, wait ────────────┐
//!            v                                       │
//!      Discovering ──ok──> Connecting ──ok──> Connected
//!        │    ^               │                  │  │
//!        │    └─── wait ──────┘  send error ─────┘  │ sentinel
//!        │ ceiling                                  v
//!        └──────────────────────────────────> ShuttingDown
//! ```
//!
//! Every wait is a [`Backoff`](DispatcherState::Backoff) that races the
//! lifecycle flag and never touches the queue, so commands issued during an
//! outage stay buffered until the next `Connected`.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::Timings;
use crate::connection::{ConnectError, Connection, Connector};
use crate::discovery::{DiscoveryFailure, TabDescriptor, TabSource};
use crate::error::DispatchError;
use crate::lifecycle::Lifecycle;
use crate::queue::{Command, CommandReceiver, Params, QueueItem, SharedParams};
use crate::status::{StatusEvent, StatusLevel, StatusSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
	Discovering,
	Connecting,
	Connected,
	Backoff,
	ShuttingDown,
}

/// How a connected session ended.
enum SessionEnd {
	Shutdown,
	ConnectionLost,
}

pub struct Dispatcher<S, C>
where
	S: TabSource,
	C: Connector,
{
	source: S,
	connector: C,
	catalog: Arc<Catalog>,
	queue: CommandReceiver,
	status: StatusSender,
	lifecycle: Lifecycle,
	timings: Timings,
	/// Process-wide parameters merged under each command's own; read per
	/// command so updates apply to the next dispatch.
	params: SharedParams,
	state: DispatcherState,
}

impl<S, C> Dispatcher<S, C>
where
	S: TabSource,
	C: Connector,
{
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		source: S,
		connector: C,
		catalog: Arc<Catalog>,
		queue: CommandReceiver,
		status: StatusSender,
		lifecycle: Lifecycle,
		timings: Timings,
		params: SharedParams,
	) -> Self {
		Self {
			source,
			connector,
			catalog,
			queue,
			status,
			lifecycle,
			timings,
			params,
			state: DispatcherState::Discovering,
		}
	}

	pub fn state(&self) -> DispatcherState {
		self.state
	}

	/// Runs until the shutdown sentinel is drained, the lifecycle stops, or
	/// discovery gives up.
	pub async fn run(mut self) -> Result<(), DispatchError> {
		let result = self.drive().await;
		self.transition(DispatcherState::ShuttingDown);
		result
	}

	async fn drive(&mut self) -> Result<(), DispatchError> {
		while self.lifecycle.is_running() {
			let Some(tab) = self.discover().await? else {
				break;
			};
			let Some(connection) = self.connect(&tab).await else {
				continue;
			};
			match self.serve(connection).await {
				SessionEnd::Shutdown => break,
				SessionEnd::ConnectionLost => {
					self.status.warn("Connection to the YouTube tab was lost, reconnecting");
				}
			}
		}
		Ok(())
	}

	/// Polls discovery until a tab is found. `None` means the lifecycle
	/// stopped while waiting.
	async fn discover(&mut self) -> Result<Option<TabDescriptor>, DispatchError> {
		self.transition(DispatcherState::Discovering);
		self.status.emit(StatusEvent::new(StatusLevel::Info, "Fetching YouTube WebSocket URL...").plain());
		let started = Instant::now();

		loop {
			if !self.lifecycle.is_running() {
				return Ok(None);
			}

			let failure = match self.source.discover().await {
				Ok(tab) => {
					info!(target = "ytctl.dispatch", url = %tab.url, endpoint = %tab.debug_endpoint, "tab found");
					self.status.emit(
						StatusEvent::new(StatusLevel::Success, format!("Found YouTube video tab: {}", tab.url))
							.plain()
							.spaced(),
					);
					return Ok(Some(tab));
				}
				Err(failure) => failure,
			};

			let elapsed = started.elapsed();
			if elapsed >= self.timings.discovery_ceiling {
				let err = DispatchError::DiscoveryCeilingExceeded { elapsed };
				self.status.error(format!("ERROR: {err}. Exiting..."));
				self.lifecycle.stop();
				return Err(err);
			}

			debug!(target = "ytctl.dispatch", error = %failure, "discovery failed");
			self.report_discovery_failure(&failure);
			if !self.backoff(self.timings.discovery_retry(&failure)).await {
				return Ok(None);
			}
			self.transition(DispatcherState::Discovering);
		}
	}

	fn report_discovery_failure(&self, failure: &DiscoveryFailure) {
		match failure {
			DiscoveryFailure::Unreachable { reason } => {
				self.status.error(
					"ERROR: Error fetching YouTube WebSocket URL. Is Chrome running with --remote-debugging-port=9222?",
				);
				self.status.error(format!("Exception: {reason}"));
			}
			DiscoveryFailure::NoTabFound { site_open: false } => {
				self.status.warn("WARNING: No YouTube tab found. Please open youtube.com in your browser.");
			}
			DiscoveryFailure::NoTabFound { site_open: true } => {
				self.status.warn("WARNING: No YouTube video detected. Please open a video in your YouTube tab...");
			}
			DiscoveryFailure::AmbiguousTabs { .. } => {
				self.status.warn(
					"WARNING: Multiple YouTube video tabs detected! Please close all but one YouTube video tab.",
				);
			}
		}
	}

	/// Opens the connection. `None` means try discovery again.
	async fn connect(&mut self, tab: &TabDescriptor) -> Option<C::Handle> {
		self.transition(DispatcherState::Connecting);
		self.status.emit(
			StatusEvent::new(StatusLevel::Info, format!("Connecting to WebSocket: {}", tab.debug_endpoint)).plain(),
		);

		let attempt = tokio::select! {
			result = self.connector.connect(tab) => result,
			_ = self.lifecycle.stopped() => return None,
		};

		match attempt {
			Ok(connection) => Some(connection),
			Err(err @ ConnectError::Timeout(_)) => {
				warn!(target = "ytctl.dispatch", error = %err, "connect timed out");
				self.status.warn(format!(
					"WARNING: WebSocket connect timed out after {:?}. Retrying...",
					self.timings.connect_timeout
				));
				self.backoff(self.timings.connect_timeout_retry).await;
				None
			}
			Err(err) => {
				warn!(target = "ytctl.dispatch", error = %err, "connect failed");
				self.status.error(format!(
					"ERROR: Error connecting to WebSocket. Retrying in {:?}.",
					self.timings.connect_error_retry
				));
				self.status.error(format!("Exception: {err}"));
				self.backoff(self.timings.connect_error_retry).await;
				None
			}
		}
	}

	/// Drains the queue into the connection until shutdown or a send fails.
	async fn serve(&mut self, mut connection: C::Handle) -> SessionEnd {
		self.transition(DispatcherState::Connected);
		self.status.emit(
			StatusEvent::new(
				StatusLevel::Success,
				format!("ytctl v{} is running and connected to the YouTube tab", crate::VERSION),
			)
			.plain(),
		);
		self.status.emit(StatusEvent::new(StatusLevel::Info, "Listening for commands...").plain());

		loop {
			let command = match self.queue.dequeue().await {
				QueueItem::Shutdown => {
					connection.close().await;
					return SessionEnd::Shutdown;
				}
				QueueItem::Command(command) => command,
			};

			let params = self.params_for(&command);
			let Some(entry) = self.catalog.get(&command.name) else {
				debug!(target = "ytctl.dispatch", command = %command.name, "unknown command dropped");
				continue;
			};
			let expression = match entry.render(&params) {
				Ok(expression) => expression,
				Err(err) => {
					warn!(target = "ytctl.dispatch", error = %err, "command dropped");
					self.status.warn(format!("WARNING: {err}"));
					continue;
				}
			};

			match connection.send(&expression).await {
				Ok(()) => {
					debug!(target = "ytctl.dispatch", command = %command.name, "sent");
					self.status.info(entry.summary(&params));
				}
				Err(err) => {
					warn!(target = "ytctl.dispatch", command = %command.name, error = %err, "send failed");
					self.status.error(format!("ERROR: Failed to execute command: {}", command.name));
					self.status.warn(format!("WebSocket error: {err}"));
					connection.close().await;
					return SessionEnd::ConnectionLost;
				}
			}
		}
	}

	fn params_for(&self, command: &Command) -> Params {
		let mut params = self.params.snapshot();
		params.extend(command.params.iter().map(|(k, v)| (k.clone(), v.clone())));
		params
	}

	async fn backoff(&mut self, delay: std::time::Duration) -> bool {
		self.transition(DispatcherState::Backoff);
		self.lifecycle.sleep(delay).await
	}

	fn transition(&mut self, next: DispatcherState) {
		if self.state != next {
			debug!(target = "ytctl.dispatch", from = ?self.state, to = ?next, "state change");
			self.state = next;
		}
	}
}
