//! The two unit lifecycles: `deploy` and `run`.

use primer::env::merged;
use primer::procfile::procfile_path;
use primer::{
	envfile, load_app_descriptor, write_config, AgentConfig, CommandRunner, EnvironmentMap,
	HookSequencer, HookSpec, Procfile, RestartPhase, SinkFactory,
};

use crate::client::ControlPlane;
use crate::error::AgentError;

/// Everything a lifecycle needs, borrowed from `main` or a test.
pub struct Context<'a, C, R> {
	pub config: &'a AgentConfig,
	pub control_plane: &'a C,
	pub runner: &'a R,
	pub sinks: &'a dyn SinkFactory,
	/// The agent's own environment, under the registration env.
	pub ambient: &'a EnvironmentMap,
}

impl<'a, C: ControlPlane, R: CommandRunner> Context<'a, C, R> {
	fn sequencer(&self) -> HookSequencer<'a, R> {
		HookSequencer::new(self.runner, self.sinks)
	}

	fn register(&self, app: &str) -> Result<EnvironmentMap, AgentError> {
		let envs = self.control_plane.register_unit(app)?;
		envfile::serialize(&envs, &self.config.paths.env_file, &self.config.agent.name)?;
		Ok(envs)
	}

	fn descriptor(&self) -> serde_yaml::Value {
		load_app_descriptor(&self.config.paths.app_dir, &self.config.agent.descriptor_files)
	}
}

/// Register, run build hooks, and write one watcher per Procfile entry.
pub async fn deploy<C: ControlPlane, R: CommandRunner>(
	ctx: &Context<'_, C, R>,
	app: &str,
) -> Result<(), AgentError> {
	let envs = ctx.register(app)?;
	let descriptor = ctx.descriptor();

	match serde_json::to_value(&descriptor) {
		Ok(json) => {
			if let Err(e) = ctx.control_plane.post_app_descriptor(app, &json) {
				tracing::warn!("could not post app descriptor: {}", e);
			}
		}
		Err(e) => tracing::warn!("could not post app descriptor: {}", AgentError::from(e)),
	}

	let hooks = HookSpec::from_descriptor(&descriptor);
	ctx.sequencer().run_build_hooks(&hooks, &envs).await?;

	let effective = merged(ctx.ambient, &envs);
	let path = procfile_path(&effective, &ctx.config.paths.app_dir);
	let procfile = Procfile::load(&path)?;
	let changed = write_config(
		&procfile,
		&ctx.config.paths.supervisor_conf,
		&effective,
		&ctx.config.watcher_template(),
	)?;
	tracing::info!(app, changed, procfile = %path.display(), "deploy finished");
	Ok(())
}

/// Restart hooks around the start command.
///
/// With `offline` the control plane is not contacted and the env file
/// written by the last registration is used instead.
pub async fn run<C: ControlPlane, R: CommandRunner>(
	ctx: &Context<'_, C, R>,
	app: &str,
	start_cmd: &str,
	offline: bool,
) -> Result<(), AgentError> {
	let envs = if offline {
		tracing::info!(path = %ctx.config.paths.env_file.display(), "offline; using persisted env");
		envfile::load_or_empty(&ctx.config.paths.env_file)?
	} else {
		ctx.register(app)?
	};

	let hooks = HookSpec::from_descriptor(&ctx.descriptor());
	let sequencer = ctx.sequencer();
	sequencer.run_restart_hooks(RestartPhase::Before, &hooks, &envs).await?;
	sequencer.run_start_command(start_cmd, &envs).await?;
	sequencer.run_restart_hooks(RestartPhase::After, &hooks, &envs).await?;
	Ok(())
}
