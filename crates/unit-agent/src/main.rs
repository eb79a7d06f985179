use clap::Parser;
use owo_colors::OwoColorize;

use unit_agent::cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
	let cli = Cli::parse();
	unit_agent::logging::init(cli.verbose, cli.quiet);
	let config = cli.load_config();

	if let Err(e) = unit_agent::execute(cli.command, &config).await {
		eprintln!("{} {}", "error:".red().bold(), e);
		std::process::exit(e.exit_code());
	}
}
