use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ytctl")]
#[command(about = "Remote-control a YouTube tab through the Chrome DevTools Protocol")]
#[command(version)]
#[command(styles = styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Config file (defaults to ~/.config/ytctl/config.json when present)
	#[arg(long, global = true, value_name = "FILE", env = "YTCTL_CONFIG")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the controller until interrupted
	Run(RunArgs),

	/// Send one command to a running controller
	Send {
		/// Command name, e.g. skip_forward
		command: String,

		/// Control port of the running controller
		#[arg(long, env = "YTCTL_PORT")]
		port: Option<u16>,
	},

	/// List the commands the controller understands
	Commands,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
	/// Loopback port to accept commands on
	#[arg(long, env = "YTCTL_PORT")]
	pub port: Option<u16>,

	/// Chrome remote debugging port
	#[arg(long, value_name = "PORT")]
	pub debug_port: Option<u16>,

	/// Seconds skipped by skip_forward / skip_backward (usually 5, 10, 30 or 60)
	#[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u32).range(1..))]
	pub skip_seconds: Option<u32>,

	/// Directory with .js files replacing the bundled command scripts
	#[arg(long, value_name = "DIR")]
	pub scripts_dir: Option<PathBuf>,

	/// Single-instance lock file
	#[arg(long, value_name = "FILE")]
	pub lock_file: Option<PathBuf>,

	/// Also read commands from stdin, one per line (`skip 10` sets the skip length, `quit` exits)
	#[arg(short, long)]
	pub interactive: bool,
}

fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Red.on_default().bold())
		.usage(AnsiColor::Red.on_default().bold())
		.literal(AnsiColor::BrightWhite.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Cyan.on_default())
}
