//! Terminal rendering of status events.
//!
//! Timestamped lines carry a `[HH:MM:SS]` prefix. When the same line comes in
//! again within the repeat window, the previous line is overwritten with a
//! `(xN)` counter instead of printing a new one.

use std::io::{self, Write};
use std::time::Instant;

use chrono::Local;
use colored::{ColoredString, Colorize};
use ytctl::{Collapsed, RepeatCollapser, StatusEvent, StatusLevel, StatusReceiver};

/// Moves the cursor to the start of the previous line.
const CURSOR_UP: &str = "\x1b[F";

pub struct Console<W> {
	out: W,
	collapser: RepeatCollapser,
}

impl Console<io::Stdout> {
	pub fn stdout() -> Self {
		Self::new(io::stdout())
	}
}

impl<W: Write> Console<W> {
	pub fn new(out: W) -> Self {
		Self {
			out,
			collapser: RepeatCollapser::default(),
		}
	}

	pub fn render(&mut self, event: &StatusEvent) -> io::Result<()> {
		self.render_at(event, Instant::now(), &Local::now().format("%H:%M:%S").to_string())
	}

	fn render_at(&mut self, event: &StatusEvent, now: Instant, clock: &str) -> io::Result<()> {
		if event.spaced {
			writeln!(self.out)?;
		}

		match self.collapser.observe(event, now) {
			Collapsed::Fresh if event.timestamped => {
				writeln!(self.out, "[{clock}] {}", paint(event.level, &event.text))?;
			}
			Collapsed::Fresh => writeln!(self.out, "{}", paint(event.level, &event.text))?,
			Collapsed::Repeat(count) => {
				writeln!(
					self.out,
					"{CURSOR_UP}[{clock}] {} (x{count})",
					paint(event.level, &event.text)
				)?;
			}
		}
		self.out.flush()
	}

	pub fn into_inner(self) -> W {
		self.out
	}
}

/// Warnings and errors are bold on top of their colour.
fn paint(level: StatusLevel, text: &str) -> ColoredString {
	let colored = match level {
		StatusLevel::Info => text.normal(),
		StatusLevel::Success => text.green(),
		StatusLevel::Warning => text.yellow(),
		StatusLevel::Error => text.red(),
	};
	if level.is_high_priority() {
		colored.bold()
	} else {
		colored
	}
}

/// Prints events until every sender is gone.
pub async fn run(mut events: StatusReceiver, mut console: Console<io::Stdout>) {
	while let Some(event) = events.recv().await {
		if let Err(err) = console.render(&event) {
			tracing::debug!(target = "ytctl.console", error = %err, "stdout closed");
			break;
		}
	}
}
