//! Lifecycle hooks declared in the app descriptor, and the order they run in.
//!
//! ```yaml
//! hooks:
//!   build:
//!     - python manage.py collectstatic --noinput
//!   restart:
//!     before-each: [...]
//!     before: [...]
//!     after-each: [...]
//!     after: [...]
//! ```
//!
//! Any failing command stops its sequence and surfaces as
//! [`Error::CommandFailed`]. The sequencer never exits the process itself.

use serde::{Deserialize, Deserializer};

use crate::env::EnvironmentMap;
use crate::error::{Error, Phase, Result};
use crate::runner::{CommandRunner, RunRequest};
use crate::sink::SinkFactory;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HookSpec {
	#[serde(default, deserialize_with = "null_as_default")]
	pub build: Vec<String>,
	#[serde(default, deserialize_with = "null_as_default")]
	pub restart: RestartHooks,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RestartHooks {
	#[serde(default, deserialize_with = "null_as_default")]
	pub before: Vec<String>,
	#[serde(default, rename = "before-each", deserialize_with = "null_as_default")]
	pub before_each: Vec<String>,
	#[serde(default, deserialize_with = "null_as_default")]
	pub after: Vec<String>,
	#[serde(default, rename = "after-each", deserialize_with = "null_as_default")]
	pub after_each: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
struct DescriptorHooks {
	#[serde(default, deserialize_with = "null_as_default")]
	hooks: HookSpec,
}

impl HookSpec {
	/// Reads the `hooks` section of an app descriptor. Anything malformed is
	/// treated as "no hooks declared".
	pub fn from_descriptor(descriptor: &serde_yaml::Value) -> Self {
		if descriptor.is_null() {
			return Self::default();
		}
		match serde_yaml::from_value::<DescriptorHooks>(descriptor.clone()) {
			Ok(d) => d.hooks,
			Err(e) => {
				tracing::warn!("ignoring malformed hooks: {}", e);
				Self::default()
			}
		}
	}

	pub fn is_empty(&self) -> bool {
		self.build.is_empty() && self.restart.is_empty()
	}
}

impl RestartHooks {
	pub fn is_empty(&self) -> bool {
		self.before.is_empty()
			&& self.before_each.is_empty()
			&& self.after.is_empty()
			&& self.after_each.is_empty()
	}

	/// Commands for `phase`, each-hooks first.
	pub fn commands(&self, phase: RestartPhase) -> impl Iterator<Item = &String> {
		let (each, once) = match phase {
			RestartPhase::Before => (&self.before_each, &self.before),
			RestartPhase::After => (&self.after_each, &self.after),
		};
		each.iter().chain(once.iter())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPhase {
	Before,
	After,
}

impl RestartPhase {
	fn phase(self) -> Phase {
		match self {
			RestartPhase::Before => Phase::RestartBefore,
			RestartPhase::After => Phase::RestartAfter,
		}
	}
}

pub struct HookSequencer<'a, R> {
	runner: &'a R,
	sinks: &'a dyn SinkFactory,
}

impl<'a, R: CommandRunner> HookSequencer<'a, R> {
	/// `sinks` receives the output of restart hooks; build hooks and the
	/// start command write straight to the agent's own streams.
	pub fn new(runner: &'a R, sinks: &'a dyn SinkFactory) -> Self {
		Self { runner, sinks }
	}

	pub async fn run_build_hooks(&self, hooks: &HookSpec, env: &EnvironmentMap) -> Result<()> {
		if hooks.build.is_empty() {
			return Ok(());
		}
		tracing::info!(count = hooks.build.len(), "running build hooks");
		for command in &hooks.build {
			self.run_one(Phase::Build, RunRequest::new(command, env)).await?;
		}
		Ok(())
	}

	pub async fn run_restart_hooks(
		&self,
		phase: RestartPhase,
		hooks: &HookSpec,
		env: &EnvironmentMap,
	) -> Result<()> {
		for command in hooks.restart.commands(phase) {
			tracing::info!(phase = %phase.phase(), command = command.as_str(), "running restart hook");
			let request = RunRequest::new(command, env).sinks(self.sinks);
			self.run_one(phase.phase(), request).await?;
		}
		Ok(())
	}

	pub async fn run_start_command(&self, command: &str, env: &EnvironmentMap) -> Result<()> {
		tracing::info!(command, "running start command");
		self.run_one(Phase::Start, RunRequest::new(command, env)).await
	}

	async fn run_one(&self, phase: Phase, request: RunRequest<'_>) -> Result<()> {
		let command = request.command;
		let code = self.runner.run(request).await?;
		if code != 0 {
			return Err(Error::CommandFailed {
				phase,
				command: command.to_string(),
				code,
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn yaml(s: &str) -> serde_yaml::Value {
		serde_yaml::from_str(s).unwrap()
	}

	#[test]
	fn reads_build_and_restart_hooks() {
		let spec = HookSpec::from_descriptor(&yaml(
			"hooks:\n  build: [b1, b2]\n  restart:\n    before: [r1]\n    before-each: [r2]\n    after-each: [r3]\n",
		));
		assert_eq!(spec.build, vec!["b1", "b2"]);
		assert_eq!(spec.restart.before, vec!["r1"]);
		assert_eq!(spec.restart.before_each, vec!["r2"]);
		assert_eq!(spec.restart.after_each, vec!["r3"]);
		assert!(spec.restart.after.is_empty());
	}

	#[test]
	fn absent_null_and_empty_sections_are_empty() {
		for doc in ["{}", "hooks: null", "hooks: {build: null}", "hooks: {build: []}", "hooks: {restart: null}", "key: x"] {
			let spec = HookSpec::from_descriptor(&yaml(doc));
			assert!(spec.is_empty(), "not empty for {}", doc);
		}
		assert!(HookSpec::from_descriptor(&serde_yaml::Value::Null).is_empty());
	}

	#[test]
	fn malformed_hooks_are_ignored() {
		let spec = HookSpec::from_descriptor(&yaml("hooks: {build: {not: a-list}}"));
		assert!(spec.is_empty());
		let spec = HookSpec::from_descriptor(&yaml("hooks: just-a-string"));
		assert!(spec.is_empty());
	}

	#[test]
	fn each_hooks_come_first() {
		let hooks = RestartHooks {
			before: vec!["b1".into()],
			before_each: vec!["b2".into()],
			after: vec!["a1".into()],
			after_each: vec!["a2".into()],
		};
		let before: Vec<_> = hooks.commands(RestartPhase::Before).collect();
		let after: Vec<_> = hooks.commands(RestartPhase::After).collect();
		assert_eq!(before, ["b2", "b1"]);
		assert_eq!(after, ["a2", "a1"]);
	}
}
