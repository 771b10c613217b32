//! Command queue between producers and the dispatcher.
//!
//! Unbounded multi-producer/single-consumer FIFO. Insertion order is delivery
//! order; nothing is coalesced or de-duplicated. [`CommandReceiver`] is not
//! `Clone`, so exactly one task can ever drain the queue.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::lifecycle::Lifecycle;

/// Value substituted into an expression template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
	Int(i64),
	Text(String),
}

impl fmt::Display for ParamValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ParamValue::Int(n) => write!(f, "{n}"),
			ParamValue::Text(s) => f.write_str(s),
		}
	}
}

impl From<i64> for ParamValue {
	fn from(value: i64) -> Self {
		ParamValue::Int(value)
	}
}

impl From<u32> for ParamValue {
	fn from(value: u32) -> Self {
		ParamValue::Int(i64::from(value))
	}
}

impl From<&str> for ParamValue {
	fn from(value: &str) -> Self {
		ParamValue::Text(value.to_string())
	}
}

impl From<String> for ParamValue {
	fn from(value: String) -> Self {
		ParamValue::Text(value)
	}
}

/// Named template parameters.
pub type Params = BTreeMap<String, ParamValue>;

/// Process-wide parameters merged under each command's own.
///
/// Clones share one value. The dispatcher reads a snapshot per command, so an
/// update applies from the next dequeued command on.
#[derive(Debug, Clone)]
pub struct SharedParams {
	tx: Arc<watch::Sender<Params>>,
}

impl Default for SharedParams {
	fn default() -> Self {
		Self::new(Params::new())
	}
}

impl SharedParams {
	pub fn new(params: Params) -> Self {
		Self {
			tx: Arc::new(watch::Sender::new(params)),
		}
	}

	pub fn set(&self, key: impl Into<String>, value: impl Into<ParamValue>) {
		let (key, value) = (key.into(), value.into());
		self.tx.send_modify(|params| {
			params.insert(key, value);
		});
	}

	pub fn get(&self, key: &str) -> Option<ParamValue> {
		self.tx.borrow().get(key).cloned()
	}

	pub fn snapshot(&self) -> Params {
		self.tx.borrow().clone()
	}
}

/// A command as placed on the queue by a producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
	pub name: String,
	pub params: Params,
}

impl Command {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			params: Params::new(),
		}
	}

	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
		self.params.insert(key.into(), value.into());
		self
	}
}

/// Queue entry: a command or the reserved shutdown sentinel.
///
/// The sentinel is a distinct variant, so no wire payload can forge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
	Command(Command),
	Shutdown,
}

/// The consumer is gone; the item was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("command queue is closed")]
pub struct QueueClosed;

/// Creates a connected producer/consumer pair. Requesting shutdown through
/// the sender also stops `lifecycle`.
pub fn command_queue(lifecycle: &Lifecycle) -> (CommandSender, CommandReceiver) {
	let (tx, rx) = mpsc::unbounded_channel();
	(
		CommandSender {
			tx,
			lifecycle: lifecycle.clone(),
		},
		CommandReceiver { rx },
	)
}

/// Producer half. Cheap to clone; never blocks.
#[derive(Debug, Clone)]
pub struct CommandSender {
	tx: mpsc::UnboundedSender<QueueItem>,
	lifecycle: Lifecycle,
}

impl CommandSender {
	pub fn enqueue(&self, command: Command) -> Result<(), QueueClosed> {
		self.tx.send(QueueItem::Command(command)).map_err(|_| QueueClosed)
	}

	/// Stops the lifecycle and appends the shutdown sentinel behind
	/// everything already queued.
	///
	/// The stop reaches tasks that are not reading the queue (discovery
	/// backoff, the listener's accept); the sentinel ends a connected session
	/// once the commands ahead of it are sent.
	pub fn request_shutdown(&self) -> Result<(), QueueClosed> {
		self.lifecycle.stop();
		self.tx.send(QueueItem::Shutdown).map_err(|_| QueueClosed)
	}
}

/// Consumer half, owned by the dispatcher.
#[derive(Debug)]
pub struct CommandReceiver {
	rx: mpsc::UnboundedReceiver<QueueItem>,
}

impl CommandReceiver {
	/// Waits for the next item.
	///
	/// Once every producer is dropped the queue can never yield a command
	/// again, which is reported as [`QueueItem::Shutdown`].
	pub async fn dequeue(&mut self) -> QueueItem {
		self.rx.recv().await.unwrap_or(QueueItem::Shutdown)
	}

	/// Number of items waiting.
	pub fn len(&self) -> usize {
		self.rx.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rx.is_empty()
	}
}
