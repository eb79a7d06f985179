use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::descriptor::DEFAULT_DESCRIPTOR_FILES;
use crate::error::{Error, Result};
use crate::watchers::{default_working_dir, WatcherTemplate};

// ── Agent config (/etc/unit-agent/config.toml) ──────────────────────────────

pub const CONFIG_PATH_VAR: &str = "UNIT_AGENT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/unit-agent/config.toml";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct AgentConfig {
	#[serde(default)]
	pub agent: AgentSection,
	#[serde(default)]
	pub paths: PathsConfig,
	#[serde(default)]
	pub watcher: WatcherTemplate,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentSection {
	/// Written into the env file header and used as the hooks' watcher name.
	#[serde(default = "default_name")]
	pub name: String,
	#[serde(default = "default_port")]
	pub default_port: String,
	#[serde(default = "default_descriptor_files")]
	pub descriptor_files: Vec<String>,
}

impl Default for AgentSection {
	fn default() -> Self {
		Self {
			name: default_name(),
			default_port: default_port(),
			descriptor_files: default_descriptor_files(),
		}
	}
}

fn default_name() -> String {
	"unit-agent".into()
}
fn default_port() -> String {
	"8888".into()
}
fn default_descriptor_files() -> Vec<String> {
	DEFAULT_DESCRIPTOR_FILES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PathsConfig {
	#[serde(default = "default_working_dir")]
	pub app_dir: PathBuf,
	#[serde(default = "default_env_file")]
	pub env_file: PathBuf,
	#[serde(default = "default_supervisor_conf")]
	pub supervisor_conf: PathBuf,
}

impl Default for PathsConfig {
	fn default() -> Self {
		Self {
			app_dir: default_working_dir(),
			env_file: default_env_file(),
			supervisor_conf: default_supervisor_conf(),
		}
	}
}

fn default_env_file() -> PathBuf {
	PathBuf::from("/home/application/apprc")
}
fn default_supervisor_conf() -> PathBuf {
	PathBuf::from("/etc/circus/circus.ini")
}

impl AgentConfig {
	/// Strict load: a missing file is defaults, a broken one is an error.
	pub fn load_from(path: &Path) -> Result<Self> {
		let content = match std::fs::read_to_string(path) {
			Ok(c) => c,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
			Err(e) => return Err(Error::io(path, e)),
		};
		toml::from_str(&content).map_err(|e| Error::Config {
			path: path.to_path_buf(),
			message: e.to_string(),
		})
	}

	/// `$UNIT_AGENT_CONFIG` or the default path; problems fall back to defaults.
	pub fn load() -> Self {
		let path = std::env::var_os(CONFIG_PATH_VAR)
			.map(PathBuf::from)
			.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
		match Self::load_from(&path) {
			Ok(config) => config,
			Err(e) => {
				tracing::warn!("using default config: {}", e);
				Self::default()
			}
		}
	}

	/// Watcher template whose working directory defaults to the app dir.
	pub fn watcher_template(&self) -> WatcherTemplate {
		let mut template = self.watcher.clone();
		template.working_dir.get_or_insert_with(|| self.paths.app_dir.clone());
		template
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_file_is_all_defaults() {
		let config: AgentConfig = toml::from_str("").unwrap();
		assert_eq!(config, AgentConfig::default());
		assert_eq!(config.agent.name, "unit-agent");
		assert_eq!(config.paths.env_file, PathBuf::from("/home/application/apprc"));
		assert_eq!(config.watcher.section_prefix, "watcher");
	}

	#[test]
	fn partial_sections_keep_other_defaults() {
		let config: AgentConfig = toml::from_str(
			"[paths]\napp_dir = \"/srv/app\"\n\n[watcher]\nuid = \"app\"\n",
		)
		.unwrap();
		assert_eq!(config.paths.app_dir, PathBuf::from("/srv/app"));
		assert_eq!(config.paths.supervisor_conf, PathBuf::from("/etc/circus/circus.ini"));
		assert_eq!(config.watcher.uid, "app");
		assert_eq!(config.watcher.gid, "ubuntu");
		assert_eq!(config.watcher_template().working_dir, Some(PathBuf::from("/srv/app")));
	}

	#[test]
	fn explicit_watcher_working_dir_beats_app_dir() {
		let config: AgentConfig = toml::from_str(
			"[paths]\napp_dir = \"/srv/app\"\n\n[watcher]\nworking_dir = \"/srv/app/web\"\n",
		)
		.unwrap();
		assert_eq!(config.watcher_template().working_dir, Some(PathBuf::from("/srv/app/web")));
		assert_eq!(config.paths.app_dir, PathBuf::from("/srv/app"));
	}

	#[test]
	fn missing_file_is_defaults_and_broken_file_is_an_error() {
		let missing = AgentConfig::load_from(Path::new("/definitely/not/here.toml")).unwrap();
		assert_eq!(missing, AgentConfig::default());

		let path = std::env::temp_dir().join(format!("unit-agent-config-{}.toml", std::process::id()));
		std::fs::write(&path, "[paths\nbroken").unwrap();
		let err = AgentConfig::load_from(&path).unwrap_err();
		assert!(matches!(err, Error::Config { .. }));
		let _ = std::fs::remove_file(&path);
	}
}
