use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use ytctl::{Catalog, ControllerConfig};
use ytctl_cli::cli::{Cli, Commands};
use ytctl_cli::{logging, run, send};

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let result = match cli.command {
		Commands::Run(args) => run::run(cli.config.as_deref(), args).await,
		Commands::Send { command, port } => send_one(cli.config.as_deref(), port, &command).await,
		Commands::Commands => list_commands(),
	};

	match result {
		Ok(code) => code,
		Err(err) => {
			eprintln!("{} {err:#}", "ERROR:".red().bold());
			ExitCode::FAILURE
		}
	}
}

async fn send_one(config: Option<&std::path::Path>, port: Option<u16>, command: &str) -> anyhow::Result<ExitCode> {
	let port = match port {
		Some(port) => port,
		None => match config {
			Some(path) => ControllerConfig::load(path)?.control_port,
			None => ControllerConfig::load_or_default()?.control_port,
		},
	};
	send::send_command(port, command).await?;
	Ok(ExitCode::SUCCESS)
}

fn list_commands() -> anyhow::Result<ExitCode> {
	let catalog = Catalog::builtin();
	let defaults = ControllerConfig::default().dispatch_params();
	let width = catalog.names().map(str::len).max().unwrap_or(0);
	for entry in catalog.entries() {
		let params = if entry.required_params.is_empty() {
			String::new()
		} else {
			format!(" ({})", entry.required_params.iter().cloned().collect::<Vec<_>>().join(", "))
		};
		let name = format!("{:<width$}", entry.name);
		println!("{}  {}{}", name.cyan(), entry.summary(&defaults), params.dimmed());
	}
	Ok(ExitCode::SUCCESS)
}
