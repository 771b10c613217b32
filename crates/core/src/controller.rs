//! Starts the core tasks and owns their shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::{ConfigError, ControllerConfig, SKIP_SECONDS_PARAM, check_skip_seconds};
use crate::connection::Connector;
use crate::discovery::TabSource;
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, Error, Result, StartupError};
use crate::ipc::{IpcListener, wake_listener};
use crate::lifecycle::Lifecycle;
use crate::queue::{CommandSender, SharedParams, command_queue};
use crate::status::StatusSender;

pub struct Controller;

impl Controller {
	/// Binds the control port, then spawns the listener and the dispatcher.
	///
	/// Nothing is spawned when the bind fails.
	pub async fn start<S, C>(
		config: &ControllerConfig,
		catalog: Catalog,
		source: S,
		connector: C,
		status: StatusSender,
	) -> std::result::Result<ControllerHandle, StartupError>
	where
		S: TabSource + 'static,
		C: Connector + 'static,
	{
		let lifecycle = Lifecycle::new();
		let (sender, receiver) = command_queue(&lifecycle);
		let params = SharedParams::new(config.dispatch_params());

		let listener = IpcListener::bind(
			config.control_addr(),
			sender.clone(),
			lifecycle.clone(),
			config.timings.ipc_read_timeout,
		)
		.await?;
		let control_addr = listener.local_addr().map_err(|source| StartupError::PortInUse {
			port: config.control_port,
			source,
		})?;
		info!(target = "ytctl.controller", addr = %control_addr, commands = catalog.len(), "controller starting");

		let dispatcher = Dispatcher::new(
			source,
			connector,
			Arc::new(catalog),
			receiver,
			status.clone(),
			lifecycle.clone(),
			config.timings,
			params.clone(),
		);

		Ok(ControllerHandle {
			sender,
			lifecycle,
			params,
			status,
			control_addr,
			listener: tokio::spawn(listener.run()),
			dispatcher: tokio::spawn(dispatcher.run()),
		})
	}
}

/// Handle to the running controller.
pub struct ControllerHandle {
	sender: CommandSender,
	lifecycle: Lifecycle,
	params: SharedParams,
	status: StatusSender,
	control_addr: SocketAddr,
	listener: JoinHandle<()>,
	dispatcher: JoinHandle<std::result::Result<(), DispatchError>>,
}

impl ControllerHandle {
	/// Producer handle for in-process command sources.
	pub fn sender(&self) -> CommandSender {
		self.sender.clone()
	}

	pub fn lifecycle(&self) -> Lifecycle {
		self.lifecycle.clone()
	}

	pub fn control_addr(&self) -> SocketAddr {
		self.control_addr
	}

	/// Changes the skip length used by every later skip command. A length
	/// outside the menu is reported to the operator and leaves the old one.
	pub fn set_skip_seconds(&self, seconds: u32) -> std::result::Result<(), ConfigError> {
		let seconds = check_skip_seconds(seconds).inspect_err(|err| self.status.warn(format!("WARNING: {err}")))?;
		self.params.set(SKIP_SECONDS_PARAM, seconds);
		info!(target = "ytctl.controller", seconds, "skip length changed");
		self.status.success(format!("Set skip seconds to {seconds}s"));
		Ok(())
	}

	/// Stops the lifecycle, queues the sentinel and wakes the listener.
	/// Safe to call more than once.
	pub async fn shutdown(&self) {
		if self.lifecycle.stop() {
			debug!(target = "ytctl.controller", "shutdown requested");
		}
		let _ = self.sender.request_shutdown();
		wake_listener(self.control_addr).await;
	}

	/// Resolves once something stopped the lifecycle.
	pub async fn stopped(&self) {
		self.lifecycle.stopped().await;
	}

	/// Waits for both tasks. The dispatcher's fatal error, if any, wins.
	pub async fn wait(self) -> Result<()> {
		let dispatched = self.dispatcher.await.map_err(|e| Error::Task {
			task: "dispatcher",
			message: e.to_string(),
		})?;

		// The dispatcher may have ended on its own (ceiling); make sure the
		// listener follows.
		self.lifecycle.stop();
		wake_listener(self.control_addr).await;
		self.listener.await.map_err(|e| Error::Task {
			task: "listener",
			message: e.to_string(),
		})?;

		info!(target = "ytctl.controller", "controller stopped");
		dispatched.map_err(Error::from)
	}
}
