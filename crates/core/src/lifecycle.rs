//! The process-wide "is running" flag.
//!
//! Backed by a `watch` channel that flips once from running to stopped and
//! never back. Every blocking wait in the core races against
//! [`Lifecycle::stopped`], so shutdown is observed as soon as it happens.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Lifecycle {
	tx: Arc<watch::Sender<bool>>,
	rx: watch::Receiver<bool>,
}

impl Default for Lifecycle {
	fn default() -> Self {
		Self::new()
	}
}

impl Lifecycle {
	pub fn new() -> Self {
		let (tx, rx) = watch::channel(true);
		Self { tx: Arc::new(tx), rx }
	}

	pub fn is_running(&self) -> bool {
		*self.rx.borrow()
	}

	/// Flips the flag to stopped. Returns `true` for the call that flipped it.
	pub fn stop(&self) -> bool {
		self.tx.send_replace(false)
	}

	/// Resolves once the flag reads stopped.
	pub async fn stopped(&self) {
		let mut rx = self.rx.clone();
		// The sender lives as long as `self`, so this only errs if it has
		// already been torn down, which also means stopped.
		let _ = rx.wait_for(|running| !*running).await;
	}

	/// Sleeps for `duration` unless stopped first.
	///
	/// Returns `true` when the full duration elapsed and the flag still reads
	/// running.
	pub async fn sleep(&self, duration: Duration) -> bool {
		tokio::select! {
			_ = tokio::time::sleep(duration) => self.is_running(),
			_ = self.stopped() => false,
		}
	}
}
