use std::io::Write;

use crate::env::EnvironmentMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
	Stdout,
	Stderr,
}

impl Stream {
	pub fn name(self) -> &'static str {
		match self {
			Stream::Stdout => "stdout",
			Stream::Stderr => "stderr",
		}
	}
}

/// What a sink is told about the stream it receives.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSpec {
	pub stream: Stream,
	pub watcher_name: String,
	pub env: EnvironmentMap,
}

/// Destination for a child's output, one line at a time.
///
/// Lines arrive without their terminator. `close` is called exactly once,
/// after the last `flush`.
pub trait OutputSink {
	fn write(&mut self, line: &str);
	fn flush(&mut self);
	fn close(&mut self);
}

pub trait SinkFactory {
	fn open(&self, spec: &StreamSpec) -> Box<dyn OutputSink>;
}

/// Echoes lines to the agent's own stdout or stderr.
pub struct EchoSink {
	stream: Stream,
}

impl EchoSink {
	pub fn new(stream: Stream) -> Self {
		Self { stream }
	}
}

impl OutputSink for EchoSink {
	fn write(&mut self, line: &str) {
		let _ = match self.stream {
			Stream::Stdout => writeln!(std::io::stdout().lock(), "{}", line),
			Stream::Stderr => writeln!(std::io::stderr().lock(), "{}", line),
		};
	}

	fn flush(&mut self) {
		let _ = match self.stream {
			Stream::Stdout => std::io::stdout().flush(),
			Stream::Stderr => std::io::stderr().flush(),
		};
	}

	fn close(&mut self) {
		self.flush();
	}
}

pub struct EchoSinkFactory;

impl SinkFactory for EchoSinkFactory {
	fn open(&self, spec: &StreamSpec) -> Box<dyn OutputSink> {
		Box::new(EchoSink::new(spec.stream))
	}
}
