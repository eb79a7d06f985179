use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Lifecycle point a command was run for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Build,
	RestartBefore,
	RestartAfter,
	Start,
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Phase::Build => "build",
			Phase::RestartBefore => "restart/before",
			Phase::RestartAfter => "restart/after",
			Phase::Start => "start",
		})
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("failed to spawn `{command}`: {source}")]
	Spawn {
		command: String,
		#[source]
		source: io::Error,
	},

	#[error("failed waiting for `{command}`: {source}")]
	Wait {
		command: String,
		#[source]
		source: io::Error,
	},

	/// A hook or start command exited non-zero. Nothing after it may run.
	#[error("{phase} command `{command}` exited with status {code}")]
	CommandFailed { phase: Phase, command: String, code: i32 },

	#[error("invalid config {}: {message}", path.display())]
	Config { path: PathBuf, message: String },
}

impl Error {
	pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
		Error::Io { path: path.into(), source }
	}

	/// Status the agent process should exit with for this failure.
	pub fn exit_code(&self) -> i32 {
		match self {
			Error::CommandFailed { code, .. } => *code,
			_ => 1,
		}
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Error::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn command_failure_carries_its_exit_code() {
		let err = Error::CommandFailed { phase: Phase::Build, command: "ble".into(), code: 5 };
		assert_eq!(err.exit_code(), 5);
		assert_eq!(err.to_string(), "build command `ble` exited with status 5");
	}

	#[test]
	fn other_failures_exit_with_one() {
		let err = Error::io("/nope", io::Error::from(io::ErrorKind::NotFound));
		assert_eq!(err.exit_code(), 1);
		assert!(err.is_not_found());
	}
}
