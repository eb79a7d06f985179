use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use primer::AgentConfig;

#[derive(Debug, Parser)]
#[command(name = "unit-agent", version, about = "Prepare an application unit for its process supervisor")]
pub struct Cli {
	#[command(subcommand)]
	pub command: Command,

	/// More log output (repeat for trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Only log warnings and errors
	#[arg(short, long, global = true, conflicts_with = "verbose")]
	pub quiet: bool,

	/// Agent config file
	#[arg(long, global = true, env = primer::config::CONFIG_PATH_VAR)]
	pub config: Option<PathBuf>,

	#[command(flatten)]
	pub paths: PathOverrides,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Register the unit, run build hooks and write the supervisor config
	Deploy {
		#[command(flatten)]
		target: Target,
	},
	/// Run restart hooks around the start command
	Run {
		#[command(flatten)]
		target: Target,
		/// Use the persisted env file instead of registering
		#[arg(long)]
		offline: bool,
		/// Command that starts the supervisor
		start_cmd: String,
	},
}

impl Command {
	pub fn target(&self) -> &Target {
		match self {
			Command::Deploy { target } | Command::Run { target, .. } => target,
		}
	}
}

/// Which control plane and app the unit belongs to.
#[derive(Debug, Args)]
pub struct Target {
	#[arg(long, env = "UNIT_AGENT_URL")]
	pub url: String,
	#[arg(long, env = "UNIT_AGENT_TOKEN", hide_env_values = true)]
	pub token: String,
	#[arg(long, env = "UNIT_AGENT_APP")]
	pub app: String,
}

#[derive(Debug, Default, Args)]
pub struct PathOverrides {
	/// Application directory (descriptor, Procfile, hook cwd)
	#[arg(long, global = true)]
	pub app_dir: Option<PathBuf>,
	/// Where the unit's environment is persisted
	#[arg(long, global = true)]
	pub env_file: Option<PathBuf>,
	/// Supervisor INI config receiving the watcher sections
	#[arg(long, global = true)]
	pub supervisor_conf: Option<PathBuf>,
}

impl Cli {
	/// Config file plus any path flags given on the command line.
	pub fn load_config(&self) -> AgentConfig {
		let mut config = match &self.config {
			Some(path) => AgentConfig::load_from(path).unwrap_or_else(|e| {
				tracing::warn!("using default config: {}", e);
				AgentConfig::default()
			}),
			None => AgentConfig::load(),
		};
		self.paths.apply(&mut config);
		config
	}
}

impl PathOverrides {
	pub fn apply(&self, config: &mut AgentConfig) {
		if let Some(dir) = &self.app_dir {
			config.paths.app_dir = dir.clone();
		}
		if let Some(file) = &self.env_file {
			config.paths.env_file = file.clone();
		}
		if let Some(conf) = &self.supervisor_conf {
			config.paths.supervisor_conf = conf.clone();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn cli_definition_is_consistent() {
		Cli::command().debug_assert();
	}

	#[test]
	fn run_takes_the_start_command_positionally() {
		let cli = Cli::try_parse_from([
			"unit-agent",
			"run",
			"--url",
			"http://cp",
			"--token",
			"t",
			"--app",
			"myapp",
			"--offline",
			"circusd /etc/circus/circus.ini",
		])
		.unwrap();
		assert_eq!(cli.command.target().url, "http://cp");
		match cli.command {
			Command::Run { target, offline, start_cmd } => {
				assert_eq!(target.app, "myapp");
				assert!(offline);
				assert_eq!(start_cmd, "circusd /etc/circus/circus.ini");
			}
			other => panic!("unexpected command: {:?}", other),
		}
	}

	#[test]
	fn path_flags_override_config() {
		let cli = Cli::try_parse_from([
			"unit-agent",
			"deploy",
			"--url",
			"http://cp",
			"--token",
			"t",
			"--app",
			"myapp",
			"--app-dir",
			"/srv/app",
			"--supervisor-conf",
			"/tmp/circus.ini",
		])
		.unwrap();
		assert_eq!(cli.command.target().app, "myapp");
		let mut config = AgentConfig::default();
		cli.paths.apply(&mut config);
		assert_eq!(config.paths.app_dir, PathBuf::from("/srv/app"));
		assert_eq!(config.paths.supervisor_conf, PathBuf::from("/tmp/circus.ini"));
		assert_eq!(config.paths.env_file, AgentConfig::default().paths.env_file);
	}
}
