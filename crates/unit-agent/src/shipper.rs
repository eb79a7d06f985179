//! Ships hook output to the control plane's log endpoint.
//!
//! Every line is echoed locally first. Shipping is best effort: a failed POST
//! is logged and the lines are dropped, the hook keeps running.

use std::time::Duration;

use primer::{EchoSink, EnvironmentMap, OutputSink, SinkFactory, StreamSpec};

pub const HOST_VAR: &str = "APP_HOST";
pub const APP_NAME_VAR: &str = "APP_NAME";
pub const TOKEN_VAR: &str = "APP_TOKEN";

/// Lines buffered before an early flush.
const MAX_BUFFERED_LINES: usize = 100;

/// Where one stream's lines go.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEndpoint {
	pub url: String,
	pub token: String,
	pub source: String,
	pub unit: String,
}

impl LogEndpoint {
	/// `None` unless host, app name and token are all set and non-empty.
	pub fn from_env(env: &EnvironmentMap, source: &str, unit: &str) -> Option<Self> {
		let get = |key: &str| env.get(key).filter(|v| !v.is_empty());
		let host = get(HOST_VAR)?;
		let app = get(APP_NAME_VAR)?;
		let token = get(TOKEN_VAR)?;
		Some(Self {
			url: format!("{}/apps/{}/log", host.trim_end_matches('/'), app),
			token: token.clone(),
			source: source.to_string(),
			unit: unit.to_string(),
		})
	}
}

pub struct LogShipper {
	echo: EchoSink,
	endpoint: Option<LogEndpoint>,
	buffer: Vec<String>,
	agent: ureq::Agent,
}

impl LogShipper {
	pub fn new(spec: &StreamSpec, unit: &str, agent: ureq::Agent) -> Self {
		let endpoint = LogEndpoint::from_env(&spec.env, &spec.watcher_name, unit);
		if endpoint.is_none() {
			tracing::debug!(stream = spec.stream.name(), "log shipping disabled; {} not configured", HOST_VAR);
		}
		Self {
			echo: EchoSink::new(spec.stream),
			endpoint,
			buffer: Vec::new(),
			agent,
		}
	}

	fn ship(&mut self) {
		let Some(endpoint) = &self.endpoint else {
			return;
		};
		if self.buffer.is_empty() {
			return;
		}
		let lines = std::mem::take(&mut self.buffer);
		let result = self
			.agent
			.post(&endpoint.url)
			.query("source", &endpoint.source)
			.query("unit", &endpoint.unit)
			.set("Authorization", &format!("bearer {}", endpoint.token))
			.send_json(&lines);
		if let Err(e) = result {
			tracing::warn!(url = %endpoint.url, lines = lines.len(), "failed to ship logs: {}", e);
		}
	}
}

impl OutputSink for LogShipper {
	fn write(&mut self, line: &str) {
		self.echo.write(line);
		if self.endpoint.is_some() {
			self.buffer.push(line.to_string());
			if self.buffer.len() >= MAX_BUFFERED_LINES {
				self.ship();
			}
		}
	}

	fn flush(&mut self) {
		self.echo.flush();
		self.ship();
	}

	fn close(&mut self) {
		self.flush();
	}
}

pub struct ShipperFactory {
	unit: String,
	agent: ureq::Agent,
}

impl ShipperFactory {
	pub fn new(unit: impl Into<String>) -> Self {
		Self {
			unit: unit.into(),
			agent: ureq::AgentBuilder::new()
				.timeout_connect(Duration::from_secs(5))
				.timeout(Duration::from_secs(30))
				.build(),
		}
	}
}

impl SinkFactory for ShipperFactory {
	fn open(&self, spec: &StreamSpec) -> Box<dyn OutputSink> {
		Box::new(LogShipper::new(spec, &self.unit, self.agent.clone()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use primer::Stream;

	fn env(pairs: &[(&str, &str)]) -> EnvironmentMap {
		pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	#[test]
	fn endpoint_needs_all_three_vars() {
		let full = env(&[(HOST_VAR, "http://cp:8080/"), (APP_NAME_VAR, "myapp"), (TOKEN_VAR, "abc")]);
		let endpoint = LogEndpoint::from_env(&full, "unit-agent", "host-1").unwrap();
		assert_eq!(endpoint.url, "http://cp:8080/apps/myapp/log");
		assert_eq!(endpoint.token, "abc");
		assert_eq!(endpoint.source, "unit-agent");
		assert_eq!(endpoint.unit, "host-1");

		for missing in [HOST_VAR, APP_NAME_VAR, TOKEN_VAR] {
			let mut partial = full.clone();
			partial.remove(missing);
			assert!(LogEndpoint::from_env(&partial, "s", "u").is_none(), "{} missing", missing);
			partial.insert(missing.to_string(), String::new());
			assert!(LogEndpoint::from_env(&partial, "s", "u").is_none(), "{} empty", missing);
		}
	}

	#[test]
	fn without_endpoint_nothing_is_buffered() {
		let spec = StreamSpec { stream: Stream::Stdout, watcher_name: "unit-agent".into(), env: EnvironmentMap::new() };
		let mut shipper = LogShipper::new(&spec, "host-1", ureq::agent());
		shipper.write("hello");
		assert!(shipper.buffer.is_empty());
		shipper.close();
	}
}
