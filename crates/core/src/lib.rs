//! Command dispatch core for remote-controlling a YouTube tab.
//!
//! Local processes drop command tokens on a loopback socket; the dispatcher
//! finds the single debuggable YouTube video tab, keeps a DevTools websocket to
//! it, and turns each command into a `Runtime.evaluate` call.
//!
//! # Pieces
//!
//! - [`catalog`]: command name to JavaScript expression templates
//! - [`discovery`]: polls the `/json` target listing and picks the tab
//! - [`connection`]: websocket lifecycle and the evaluate envelope
//! - [`queue`]: FIFO hand-off between producers and the dispatcher
//! - [`ipc`]: loopback control socket, one command per connection
//! - [`dispatcher`]: the reconnecting state machine
//! - [`controller`]: wires the above together and owns shutdown
//!
//! Recoverable failures never leave the dispatcher. The operator sees them as
//! [`StatusEvent`]s; diagnostics go through `tracing`.

pub mod catalog;
pub mod config;
pub mod connection;
pub mod controller;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod ipc;
pub mod lifecycle;
pub mod queue;
pub mod status;

pub use catalog::{Catalog, CatalogEntry, CatalogError};
pub use config::{ConfigError, ControllerConfig, SKIP_SECONDS_OPTIONS, Timings};
pub use connection::{CdpConnection, CdpConnector, ConnectError, Connection, Connector, SendError};
pub use controller::{Controller, ControllerHandle};
pub use discovery::{DiscoveryFailure, HttpTabSource, TabDescriptor, TabFilter, TabSource};
pub use dispatcher::{Dispatcher, DispatcherState};
pub use error::{DispatchError, Error, Result, StartupError};
pub use ipc::{IpcListener, MAX_COMMAND_BYTES};
pub use lifecycle::Lifecycle;
pub use queue::{
	Command, CommandReceiver, CommandSender, ParamValue, Params, QueueClosed, QueueItem, SharedParams,
	command_queue,
};
pub use status::{
	Collapsed, REPEAT_WINDOW, RepeatCollapser, StatusEvent, StatusLevel, StatusReceiver, StatusSender, status_channel,
};

/// Version reported in the welcome banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
