use tracing::Level;

/// Logs go to stderr; stdout belongs to the hooks.
pub fn init(verbose: u8, quiet: bool) {
	let level = if quiet {
		Level::WARN
	} else {
		match verbose {
			0 => Level::INFO,
			1 => Level::DEBUG,
			_ => Level::TRACE,
		}
	};
	tracing_subscriber::fmt()
		.with_max_level(level)
		.with_writer(std::io::stderr)
		.with_target(false)
		.init();
}
