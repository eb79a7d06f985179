use std::time::Duration;

use primer::EnvironmentMap;
use serde::Deserialize;

use crate::error::AgentError;

/// The control plane as the agent sees it.
pub trait ControlPlane {
	/// Announce this unit and receive the app's environment.
	fn register_unit(&self, app: &str) -> Result<EnvironmentMap, AgentError>;

	/// Hand the parsed app descriptor back to the control plane.
	fn post_app_descriptor(&self, app: &str, descriptor: &serde_json::Value) -> Result<(), AgentError>;
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnvVar {
	name: String,
	value: String,
}

/// Registration answer plus the port defaults every unit relies on.
pub(crate) fn env_from_vars(vars: Vec<EnvVar>, default_port: &str) -> EnvironmentMap {
	let mut env: EnvironmentMap = vars.into_iter().map(|v| (v.name, v.value)).collect();
	for key in ["port", "PORT"] {
		env.entry(key.to_string()).or_insert_with(|| default_port.to_string());
	}
	env
}

pub struct HttpControlPlane {
	url: String,
	token: String,
	hostname: String,
	default_port: String,
	agent: ureq::Agent,
}

impl HttpControlPlane {
	pub fn new(
		url: impl Into<String>,
		token: impl Into<String>,
		hostname: impl Into<String>,
		default_port: impl Into<String>,
	) -> Self {
		let url: String = url.into();
		Self {
			url: url.trim_end_matches('/').to_string(),
			token: token.into(),
			hostname: hostname.into(),
			default_port: default_port.into(),
			agent: ureq::AgentBuilder::new()
				.timeout_connect(Duration::from_secs(10))
				.build(),
		}
	}

	fn authorization(&self) -> String {
		format!("bearer {}", self.token)
	}

	fn app_url(&self, app: &str, path: &str) -> String {
		format!("{}/apps/{}/{}", self.url, app, path)
	}

	fn fetch_env(&self, app: &str) -> Result<ureq::Response, AgentError> {
		let url = self.app_url(app, "env");
		self.agent
			.get(&url)
			.set("Authorization", &self.authorization())
			.call()
			.map_err(|e| AgentError::request("GET", &url, e))
	}
}

impl ControlPlane for HttpControlPlane {
	fn register_unit(&self, app: &str) -> Result<EnvironmentMap, AgentError> {
		let url = self.app_url(app, "units/register");
		let response = match self
			.agent
			.post(&url)
			.set("Authorization", &self.authorization())
			.send_form(&[("hostname", self.hostname.as_str())])
		{
			Ok(response) if response.status() == 200 => response,
			Ok(response) => {
				tracing::warn!(status = response.status(), "unit registration not accepted; fetching app env");
				self.fetch_env(app)?
			}
			Err(ureq::Error::Status(status, _)) => {
				tracing::warn!(status, "unit registration refused; fetching app env");
				self.fetch_env(app)?
			}
			Err(e) => return Err(AgentError::request("POST", &url, e)),
		};

		let vars: Vec<EnvVar> = response
			.into_json()
			.map_err(|source| AgentError::Response { url: url.clone(), source })?;
		tracing::info!(app, vars = vars.len(), hostname = %self.hostname, "registered unit");
		Ok(env_from_vars(vars, &self.default_port))
	}

	fn post_app_descriptor(&self, app: &str, descriptor: &serde_json::Value) -> Result<(), AgentError> {
		let url = self.app_url(app, "customdata");
		self.agent
			.post(&url)
			.set("Authorization", &self.authorization())
			.send_json(descriptor)
			.map_err(|e| AgentError::request("POST", &url, e))?;
		tracing::debug!(app, "posted app descriptor");
		Ok(())
	}
}

pub fn hostname() -> Result<String, AgentError> {
	let name = nix::unistd::gethostname()?;
	Ok(name.to_string_lossy().into_owned())
}
