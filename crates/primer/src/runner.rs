//! Runs one shell command to completion.
//!
//! [`ShellRunner`] is the real thing: `sh -c` under tokio, environment built
//! from an ambient snapshot plus per-call overrides. When a [`SinkFactory`]
//! is supplied, stdout and stderr are piped and forwarded line by line while
//! the caller waits. Both readers and the wait are joined on the current task,
//! so a quiet stream never stalls the other one.

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::env::{merged, EnvironmentMap};
use crate::error::{Error, Result};
use crate::sink::{OutputSink, SinkFactory, Stream, StreamSpec};

pub struct RunRequest<'a> {
	pub command: &'a str,
	/// Falls back to the runner's default directory when unset.
	pub cwd: Option<&'a Path>,
	/// Overrides layered on top of the runner's ambient environment.
	pub env: &'a EnvironmentMap,
	pub sinks: Option<&'a dyn SinkFactory>,
}

impl<'a> RunRequest<'a> {
	pub fn new(command: &'a str, env: &'a EnvironmentMap) -> Self {
		Self { command, cwd: None, env, sinks: None }
	}

	pub fn cwd(mut self, cwd: &'a Path) -> Self {
		self.cwd = Some(cwd);
		self
	}

	pub fn sinks(mut self, sinks: &'a dyn SinkFactory) -> Self {
		self.sinks = Some(sinks);
		self
	}
}

/// Runs a command and reports its exit status. Interpreting a non-zero
/// status is left to the caller.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
	async fn run(&self, request: RunRequest<'_>) -> Result<i32>;
}

pub struct ShellRunner {
	ambient: EnvironmentMap,
	default_dir: PathBuf,
	watcher_name: String,
}

impl ShellRunner {
	pub fn new(ambient: EnvironmentMap, default_dir: impl Into<PathBuf>, watcher_name: impl Into<String>) -> Self {
		Self {
			ambient,
			default_dir: default_dir.into(),
			watcher_name: watcher_name.into(),
		}
	}

	pub fn working_dir(&self, cwd: Option<&Path>) -> PathBuf {
		match cwd {
			Some(dir) => dir.to_path_buf(),
			None if self.default_dir.is_dir() => self.default_dir.clone(),
			None => PathBuf::from("/"),
		}
	}

	pub fn effective_env(&self, overrides: &EnvironmentMap) -> EnvironmentMap {
		merged(&self.ambient, overrides)
	}

	fn stream_spec(&self, stream: Stream, env: &EnvironmentMap) -> StreamSpec {
		StreamSpec {
			stream,
			watcher_name: self.watcher_name.clone(),
			env: env.clone(),
		}
	}
}

impl CommandRunner for ShellRunner {
	async fn run(&self, request: RunRequest<'_>) -> Result<i32> {
		let env = self.effective_env(request.env);
		let cwd = self.working_dir(request.cwd);

		let mut cmd = Command::new("sh");
		cmd.arg("-c")
			.arg(request.command)
			.current_dir(&cwd)
			.env_clear()
			.envs(&env);
		if request.sinks.is_some() {
			cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
		}

		tracing::debug!(command = request.command, cwd = %cwd.display(), "running");

		let mut child = cmd.spawn().map_err(|source| Error::Spawn {
			command: request.command.to_string(),
			source,
		})?;

		let status = match request.sinks {
			None => child.wait().await,
			Some(factory) => {
				let mut out = factory.open(&self.stream_spec(Stream::Stdout, &env));
				let mut err = factory.open(&self.stream_spec(Stream::Stderr, &env));
				let stdout = child.stdout.take();
				let stderr = child.stderr.take();

				let (status, _, _) = tokio::join!(
					child.wait(),
					pipe_lines(stdout, out.as_mut()),
					pipe_lines(stderr, err.as_mut()),
				);

				for sink in [&mut out, &mut err] {
					sink.flush();
					sink.close();
				}
				status
			}
		}
		.map_err(|source| Error::Wait {
			command: request.command.to_string(),
			source,
		})?;

		let code = exit_code(status);
		tracing::debug!(command = request.command, code, "finished");
		Ok(code)
	}
}

async fn pipe_lines<R: AsyncRead + Unpin>(reader: Option<R>, sink: &mut dyn OutputSink) {
	let Some(reader) = reader else { return };
	let mut reader = BufReader::new(reader);
	let mut buf = Vec::new();

	loop {
		buf.clear();
		match reader.read_until(b'\n', &mut buf).await {
			Ok(0) => break,
			Ok(_) => {
				if buf.last() == Some(&b'\n') {
					buf.pop();
				}
				sink.write(&String::from_utf8_lossy(&buf));
			}
			Err(e) => {
				tracing::warn!("output pipe read failed: {}", e);
				break;
			}
		}
	}
}

/// Exit status as a shell would report it: signal deaths become `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
	status
		.code()
		.or_else(|| status.signal().map(|sig| 128 + sig))
		.unwrap_or(1)
}
