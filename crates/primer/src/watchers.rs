//! Watcher sections in the process manager's INI config.
//!
//! One `[<prefix>:<name>]` section per Procfile entry. Sections that already
//! exist are rewritten where they stand; new ones are appended. Everything
//! else in the file is left alone, and re-running with the same inputs
//! reproduces the file byte for byte.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::env::{expand, EnvironmentMap};
use crate::envfile::write_atomic;
use crate::error::{Error, Result};
use crate::procfile::{ProcessType, Procfile};

/// Environment variable overriding the watchers' working directory.
pub const WORKING_DIR_VAR: &str = "APP_WORKING_DIR";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WatcherTemplate {
	#[serde(default = "default_section_prefix")]
	pub section_prefix: String,
	#[serde(default = "default_identity")]
	pub uid: String,
	#[serde(default = "default_identity")]
	pub gid: String,
	#[serde(default = "default_stream_class")]
	pub stream_class: String,
	/// Unset means the app directory.
	#[serde(default)]
	pub working_dir: Option<PathBuf>,
}

impl Default for WatcherTemplate {
	fn default() -> Self {
		Self {
			section_prefix: default_section_prefix(),
			uid: default_identity(),
			gid: default_identity(),
			stream_class: default_stream_class(),
			working_dir: None,
		}
	}
}

fn default_section_prefix() -> String {
	"watcher".into()
}
fn default_identity() -> String {
	"ubuntu".into()
}
fn default_stream_class() -> String {
	"unit_agent.stream.Stream".into()
}
pub(crate) fn default_working_dir() -> PathBuf {
	PathBuf::from("/home/application/current")
}

impl WatcherTemplate {
	fn header(&self, name: &str) -> String {
		format!("[{}:{}]", self.section_prefix, name)
	}

	/// Section text for one process type, header included, newline-terminated.
	pub fn render(&self, process: &ProcessType, env: &EnvironmentMap) -> String {
		let working_dir = match env.get(WORKING_DIR_VAR) {
			Some(dir) if !dir.is_empty() => dir.clone(),
			_ => self
				.working_dir
				.clone()
				.unwrap_or_else(default_working_dir)
				.display()
				.to_string(),
		};
		let name = &process.name;
		let class = &self.stream_class;

		format!(
			"{header}\n\
			 cmd = {cmd}\n\
			 copy_env = True\n\
			 uid = {uid}\n\
			 gid = {gid}\n\
			 working_dir = {working_dir}\n\
			 stdout_stream.class = {class}\n\
			 stdout_stream.watcher_name = {name}\n\
			 stderr_stream.class = {class}\n\
			 stderr_stream.watcher_name = {name}\n",
			header = self.header(name),
			cmd = expand(&process.command, env),
			uid = self.uid,
			gid = self.gid,
		)
	}
}

fn is_header(line: &str) -> bool {
	let line = line.trim();
	line.starts_with('[') && line.ends_with(']')
}

/// The config text after applying `procfile` to `existing`.
pub fn synthesize(
	existing: &str,
	procfile: &Procfile,
	env: &EnvironmentMap,
	template: &WatcherTemplate,
) -> String {
	if procfile.is_empty() {
		return existing.to_string();
	}

	let mut lines: Vec<String> = existing.split_inclusive('\n').map(String::from).collect();

	for process in &procfile.processes {
		let header = template.header(&process.name);
		let section = template.render(process, env);

		let Some(start) = lines.iter().position(|l| l.trim() == header) else {
			let mut tail = String::new();
			if lines.last().is_some_and(|l| !l.ends_with('\n')) {
				tail.push('\n');
			}
			tail.push('\n');
			tail.push_str(&section);
			lines.extend(tail.split_inclusive('\n').map(String::from));
			continue;
		};

		// Later copies of the same header are dropped, last first so indices hold.
		let mut i = lines.len();
		while i > start + 1 {
			i -= 1;
			if lines[i].trim() == header {
				let end = section_end(&lines, i);
				lines.drain(i..end);
			}
		}

		let end = section_end(&lines, start);
		let body_end = (start..end)
			.rev()
			.find(|&j| !lines[j].trim().is_empty())
			.map_or(start, |j| j + 1);
		let mut replacement: Vec<String> = section.split_inclusive('\n').map(String::from).collect();
		if body_end == lines.len() && lines.last().is_some_and(|l| !l.ends_with('\n')) {
			// The section ended the file without a final newline; keep it that way.
			if let Some(last) = replacement.last_mut() {
				last.pop();
			}
		}
		lines.splice(start..body_end, replacement);
	}

	lines.concat()
}

/// Index one past the last line of the section whose header is at `start`.
fn section_end(lines: &[String], start: usize) -> usize {
	lines[start + 1..]
		.iter()
		.position(|l| is_header(l))
		.map_or(lines.len(), |p| start + 1 + p)
}

/// Rewrites the config at `path` for `procfile`. Returns whether the file changed.
///
/// A missing config is treated as empty. An empty Procfile never touches the file.
pub fn write_config(
	procfile: &Procfile,
	path: &Path,
	env: &EnvironmentMap,
	template: &WatcherTemplate,
) -> Result<bool> {
	if procfile.is_empty() {
		tracing::info!("no process types declared; leaving {} untouched", path.display());
		return Ok(false);
	}

	let existing = match std::fs::read_to_string(path) {
		Ok(s) => s,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
		Err(e) => return Err(Error::io(path, e)),
	};

	let updated = synthesize(&existing, procfile, env, template);
	if updated == existing {
		tracing::debug!(path = %path.display(), "supervisor config already up to date");
		return Ok(false);
	}

	write_atomic(path, updated.as_bytes())?;
	tracing::info!(
		path = %path.display(),
		watchers = procfile.processes.len(),
		"wrote supervisor config"
	);
	Ok(true)
}
