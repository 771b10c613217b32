//! Operator-facing status events.
//!
//! The dispatcher only emits [`StatusEvent`]s on a channel. Rendering, and the
//! collapsing of repeated lines into a `(xN)` counter, belong to whoever owns
//! the [`StatusReceiver`]; [`RepeatCollapser`] holds that counter.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

/// Window in which an identical line counts as a repeat.
pub const REPEAT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
	Info,
	Success,
	Warning,
	Error,
}

impl StatusLevel {
	pub fn is_high_priority(self) -> bool {
		matches!(self, StatusLevel::Warning | StatusLevel::Error)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
	pub level: StatusLevel,
	pub text: String,
	/// Timestamped lines take part in repeat collapsing; plain ones (banner,
	/// connection milestones) always print and reset the counter.
	pub timestamped: bool,
	/// Print an empty line before this one.
	pub spaced: bool,
}

impl StatusEvent {
	pub fn new(level: StatusLevel, text: impl Into<String>) -> Self {
		Self {
			level,
			text: text.into(),
			timestamped: true,
			spaced: false,
		}
	}

	pub fn plain(mut self) -> Self {
		self.timestamped = false;
		self
	}

	pub fn spaced(mut self) -> Self {
		self.spaced = true;
		self
	}

	/// Key used for repeat detection.
	pub fn dedupe_key(&self) -> &str {
		&self.text
	}
}

pub fn status_channel() -> (StatusSender, StatusReceiver) {
	let (tx, rx) = mpsc::unbounded_channel();
	(StatusSender { tx }, rx)
}

pub type StatusReceiver = mpsc::UnboundedReceiver<StatusEvent>;

/// Emitting side. Sends never block and are dropped once nobody listens.
#[derive(Debug, Clone)]
pub struct StatusSender {
	tx: mpsc::UnboundedSender<StatusEvent>,
}

impl StatusSender {
	pub fn emit(&self, event: StatusEvent) {
		let _ = self.tx.send(event);
	}

	pub fn info(&self, text: impl Into<String>) {
		self.emit(StatusEvent::new(StatusLevel::Info, text));
	}

	pub fn success(&self, text: impl Into<String>) {
		self.emit(StatusEvent::new(StatusLevel::Success, text));
	}

	pub fn warn(&self, text: impl Into<String>) {
		self.emit(StatusEvent::new(StatusLevel::Warning, text));
	}

	pub fn error(&self, text: impl Into<String>) {
		self.emit(StatusEvent::new(StatusLevel::Error, text));
	}
}

/// How a line relates to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collapsed {
	/// Print as a new line.
	Fresh,
	/// Same as the previous line; overwrite it with this repeat count.
	Repeat(u32),
}

/// Tracks the last timestamped line and how often it repeated.
#[derive(Debug)]
pub struct RepeatCollapser {
	window: Duration,
	last: Option<String>,
	last_at: Option<Instant>,
	count: u32,
}

impl Default for RepeatCollapser {
	fn default() -> Self {
		Self::new(REPEAT_WINDOW)
	}
}

impl RepeatCollapser {
	pub fn new(window: Duration) -> Self {
		Self {
			window,
			last: None,
			last_at: None,
			count: 0,
		}
	}

	pub fn observe(&mut self, event: &StatusEvent, now: Instant) -> Collapsed {
		if !event.timestamped {
			self.last = None;
			self.last_at = None;
			self.count = 0;
			return Collapsed::Fresh;
		}

		let within_window = self
			.last_at
			.is_some_and(|at| now.saturating_duration_since(at) < self.window);
		let repeated = within_window && self.last.as_deref() == Some(event.dedupe_key());

		self.last_at = Some(now);
		if repeated {
			self.count += 1;
			Collapsed::Repeat(self.count)
		} else {
			self.last = Some(event.dedupe_key().to_string());
			self.count = 1;
			Collapsed::Fresh
		}
	}
}
