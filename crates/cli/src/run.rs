//! `ytctl run`: lock, start the controller, render status until shutdown.

use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};
use ytctl::{
	Catalog, CdpConnector, Command, Controller, ControllerConfig, ControllerHandle, HttpTabSource, StatusEvent,
	StatusLevel, VERSION, status_channel,
};

use crate::cli::RunArgs;
use crate::console::{self, Console};
use crate::instance::{InstanceGuard, default_lock_path};

/// Stdin line that stops the controller.
const QUIT: &str = "quit";
/// Stdin prefix that changes the skip length, as in `skip 30`.
const SKIP: &str = "skip";

/// One non-empty line typed at the console.
#[derive(Debug, PartialEq, Eq)]
enum ConsoleInput {
	Quit,
	SetSkip(u32),
	/// `skip` followed by something other than a number.
	BadSkip(String),
	Command(String),
}

fn parse_console_line(line: &str) -> Option<ConsoleInput> {
	let line = line.trim();
	if line.is_empty() {
		return None;
	}
	if line == QUIT {
		return Some(ConsoleInput::Quit);
	}
	let mut words = line.split_whitespace();
	if words.next() == Some(SKIP) {
		let rest: Vec<&str> = words.collect();
		if !rest.is_empty() {
			return Some(match rest.as_slice() {
				[n] => n.parse().map_or_else(|_| ConsoleInput::BadSkip(line.to_string()), ConsoleInput::SetSkip),
				_ => ConsoleInput::BadSkip(line.to_string()),
			});
		}
	}
	Some(ConsoleInput::Command(line.to_string()))
}

/// Loads the config file (explicit path, else the default location if it
/// exists) and applies command-line overrides.
pub fn resolve_config(path: Option<&Path>, args: &RunArgs) -> Result<ControllerConfig> {
	let mut config = match path {
		Some(path) => ControllerConfig::load(path)?,
		None => ControllerConfig::load_or_default()?,
	};

	if let Some(port) = args.port {
		config.control_port = port;
	}
	if let Some(port) = args.debug_port {
		config.debug_port = port;
	}
	if let Some(seconds) = args.skip_seconds {
		config.skip_seconds = seconds;
	}
	if let Some(dir) = &args.scripts_dir {
		config.scripts_dir = Some(dir.clone());
	}
	config.validate()?;
	Ok(config)
}

pub async fn run(config_path: Option<&Path>, args: RunArgs) -> Result<ExitCode> {
	let config = resolve_config(config_path, &args).context("failed to load configuration")?;

	let lock_path = args.lock_file.clone().unwrap_or_else(default_lock_path);
	let _guard = match InstanceGuard::acquire(&lock_path) {
		Ok(guard) => guard,
		Err(err) => return Ok(fatal(&err)),
	};

	let catalog = Catalog::load(config.scripts_dir.as_deref())?;
	let source = HttpTabSource::new(config.discovery_url(), config.tab_filter(), config.timings.http_timeout)?;
	let connector = CdpConnector::new(config.timings.connect_timeout);

	let (status, events) = status_channel();
	let renderer = tokio::spawn(console::run(events, Console::stdout()));
	status.emit(StatusEvent::new(StatusLevel::Success, format!("ytctl v{VERSION}")).plain());
	status.emit(
		StatusEvent::new(
			StatusLevel::Info,
			format!(
				"Skip length: {}s. Press Ctrl+C to stop.",
				config.skip_seconds
			),
		)
		.plain(),
	);

	let handle = match Controller::start(&config, catalog, source, connector, status).await {
		Ok(handle) => handle,
		Err(err) => {
			let _ = renderer.await;
			return Ok(fatal(&err));
		}
	};

	let (input_tx, mut input_rx) = mpsc::unbounded_channel();
	if args.interactive {
		spawn_stdin_reader(input_tx);
	}

	let signal = shutdown_signal();
	tokio::pin!(signal);
	loop {
		tokio::select! {
			_ = &mut signal => {
				info!(target = "ytctl.run", "interrupt received, shutting down");
				break;
			}
			_ = handle.stopped() => break,
			Some(input) = input_rx.recv() => {
				if !apply_console_input(&handle, input) {
					info!(target = "ytctl.run", "quit requested from console");
					break;
				}
			}
		}
	}

	handle.shutdown().await;
	let outcome = handle.wait().await;
	// All status senders are gone once the handle and the dispatcher are.
	let _ = renderer.await;

	match outcome {
		Ok(()) => {
			println!("Exiting...");
			Ok(ExitCode::SUCCESS)
		}
		Err(err) => Ok(fatal(&err)),
	}
}

fn fatal(err: &dyn std::fmt::Display) -> ExitCode {
	use colored::Colorize;

	eprintln!("{} {err}", "ERROR:".red().bold());
	ExitCode::FAILURE
}

/// Acts on one console line. Returns `false` once the operator quits.
fn apply_console_input(handle: &ControllerHandle, input: ConsoleInput) -> bool {
	match input {
		ConsoleInput::Quit => return false,
		ConsoleInput::SetSkip(seconds) => {
			// Rejected lengths are already reported on the console.
			let _ = handle.set_skip_seconds(seconds);
		}
		ConsoleInput::BadSkip(line) => {
			warn!(target = "ytctl.run", line, "expected `skip <seconds>`");
		}
		ConsoleInput::Command(name) => {
			if handle.sender().enqueue(Command::new(name)).is_err() {
				warn!(target = "ytctl.run", "command queue closed");
			}
		}
	}
	true
}

/// Reads stdin on a plain thread and forwards parsed lines. Stops after
/// `quit` or at end of input.
fn spawn_stdin_reader(inputs: mpsc::UnboundedSender<ConsoleInput>) {
	std::thread::spawn(move || {
		for line in std::io::stdin().lock().lines() {
			let line = match line {
				Ok(line) => line,
				Err(err) => {
					warn!(target = "ytctl.run", error = %err, "stdin read failed");
					break;
				}
			};
			let Some(input) = parse_console_line(&line) else {
				continue;
			};
			let quit = input == ConsoleInput::Quit;
			if inputs.send(input).is_err() || quit {
				return;
			}
		}
	});
}

#[cfg(unix)]
async fn shutdown_signal() {
	use tokio::signal::unix::{SignalKind, signal};

	let (Ok(mut sigint), Ok(mut sigterm)) = (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) else {
		warn!(target = "ytctl.run", "failed to install signal handlers; falling back to ctrl_c");
		let _ = tokio::signal::ctrl_c().await;
		return;
	};
	tokio::select! {
		_ = sigint.recv() => {}
		_ = sigterm.recv() => {}
	}
}

#[cfg(not(unix))]
async fn shutdown_signal() {
	let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	#[test]
	fn flags_override_the_config_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{ "skip_seconds": 10, "control_port": 7000, "debug_port": 9333 }}"#).unwrap();

		let args = RunArgs {
			skip_seconds: Some(60),
			port: Some(7100),
			..RunArgs::default()
		};
		let config = resolve_config(Some(file.path()), &args).unwrap();
		assert_eq!(config.skip_seconds, 60);
		assert_eq!(config.control_port, 7100);
		assert_eq!(config.debug_port, 9333);
	}

	#[test]
	fn console_lines_parse_into_inputs() {
		assert_eq!(parse_console_line("  quit \n"), Some(ConsoleInput::Quit));
		assert_eq!(parse_console_line("skip 30"), Some(ConsoleInput::SetSkip(30)));
		assert_eq!(parse_console_line("skip  7"), Some(ConsoleInput::SetSkip(7)));
		assert_eq!(parse_console_line("skip ten"), Some(ConsoleInput::BadSkip("skip ten".into())));
		assert_eq!(parse_console_line("skip 5 10"), Some(ConsoleInput::BadSkip("skip 5 10".into())));
		assert_eq!(parse_console_line("skip_forward"), Some(ConsoleInput::Command("skip_forward".into())));
		assert_eq!(parse_console_line("skip"), Some(ConsoleInput::Command("skip".into())));
		assert_eq!(parse_console_line("   "), None);
	}

	#[test]
	fn missing_explicit_config_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let err = resolve_config(Some(&dir.path().join("nope.json")), &RunArgs::default()).unwrap_err();
		assert!(err.to_string().contains("nope.json"));
	}
}
