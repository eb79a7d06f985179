//! Deploy-time agent for an application unit.
//!
//! Registers the unit with the control plane, persists its environment and
//! drives [`primer`] through the `deploy` and `run` lifecycles.

pub mod cli;
pub mod client;
pub mod error;
pub mod logging;
pub mod shipper;
pub mod tasks;

pub use client::{ControlPlane, HttpControlPlane};
pub use error::AgentError;
pub use tasks::Context;

use primer::{AgentConfig, ShellRunner};

use cli::Command;
use shipper::ShipperFactory;

/// Dispatches one parsed command against the real control plane and shell.
pub async fn execute(command: Command, config: &AgentConfig) -> Result<(), AgentError> {
	let hostname = client::hostname()?;
	let ambient = primer::env::ambient();
	let runner = ShellRunner::new(ambient.clone(), &config.paths.app_dir, &config.agent.name);
	let sinks = ShipperFactory::new(&hostname);

	let target = command.target();
	let control_plane =
		HttpControlPlane::new(&target.url, &target.token, &hostname, &config.agent.default_port);
	let ctx = Context {
		config,
		control_plane: &control_plane,
		runner: &runner,
		sinks: &sinks,
		ambient: &ambient,
	};

	match &command {
		Command::Deploy { .. } => tasks::deploy(&ctx, &target.app).await,
		Command::Run { offline, start_cmd, .. } => tasks::run(&ctx, &target.app, start_cmd, *offline).await,
	}
}
