#[derive(Debug, thiserror::Error)]
pub enum AgentError {
	#[error(transparent)]
	Prime(#[from] primer::Error),

	#[error("{method} {url} failed: {message}")]
	ControlPlane {
		method: &'static str,
		url: String,
		message: String,
	},

	#[error("unreadable response from {url}: {source}")]
	Response {
		url: String,
		#[source]
		source: std::io::Error,
	},

	#[error("app descriptor is not representable as JSON: {0}")]
	Descriptor(#[from] serde_json::Error),

	#[error("could not determine hostname: {0}")]
	Hostname(#[from] nix::Error),
}

impl AgentError {
	pub(crate) fn request(method: &'static str, url: &str, err: ureq::Error) -> Self {
		let message = match err {
			ureq::Error::Status(code, response) => format!("status {} {}", code, response.status_text()),
			ureq::Error::Transport(transport) => transport.to_string(),
		};
		AgentError::ControlPlane { method, url: url.to_string(), message }
	}

	/// A failing hook keeps its own status; everything else exits 1.
	pub fn exit_code(&self) -> i32 {
		match self {
			AgentError::Prime(e) => e.exit_code(),
			_ => 1,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hook_failures_keep_their_exit_code() {
		let err: AgentError = primer::Error::CommandFailed {
			phase: primer::Phase::RestartAfter,
			command: "a1".into(),
			code: 42,
		}
		.into();
		assert_eq!(err.exit_code(), 42);
		assert_eq!(err.to_string(), "restart/after command `a1` exited with status 42");
	}

	#[test]
	fn control_plane_failures_exit_with_one() {
		let err = AgentError::ControlPlane {
			method: "POST",
			url: "http://localhost/apps/myapp/units/register".into(),
			message: "connection refused".into(),
		};
		assert_eq!(err.exit_code(), 1);
	}
}
