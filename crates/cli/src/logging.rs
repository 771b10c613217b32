use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Diagnostics go to stderr; stdout belongs to the status console.
pub fn init_logging(verbosity: u8) {
	// 0 = warnings only, 1 (-v) = info, 2+ (-vv) = debug including the wire
	let filter = match verbosity {
		0 => "warn",
		1 => "info,ytctl=info",
		_ => "debug,hyper=info,reqwest=info,tungstenite=info",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
