use std::path::{Path, PathBuf};

use crate::env::EnvironmentMap;
use crate::error::{Error, Result};

/// Environment variable that points at an alternative Procfile.
pub const PROCFILE_PATH_VAR: &str = "PROCFILE_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessType {
	pub name: String,
	pub command: String,
}

/// Process types in declaration order. Commands are kept unexpanded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Procfile {
	pub processes: Vec<ProcessType>,
}

impl Procfile {
	pub fn parse(content: &str) -> Self {
		let mut processes: Vec<ProcessType> = Vec::new();

		for line in content.lines() {
			let line = line.trim();
			if line.is_empty() || line.starts_with('#') {
				continue;
			}
			let Some((name, command)) = line.split_once(':') else {
				continue;
			};
			let (name, command) = (name.trim(), command.trim());
			if name.is_empty() || command.is_empty() {
				continue;
			}

			match processes.iter_mut().find(|p| p.name == name) {
				Some(existing) => existing.command = command.to_string(),
				None => processes.push(ProcessType {
					name: name.to_string(),
					command: command.to_string(),
				}),
			}
		}

		Self { processes }
	}

	/// A missing file is an empty Procfile.
	pub fn load(path: &Path) -> Result<Self> {
		match std::fs::read_to_string(path) {
			Ok(content) => Ok(Self::parse(&content)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				tracing::debug!(path = %path.display(), "no Procfile");
				Ok(Self::default())
			}
			Err(e) => Err(Error::io(path, e)),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.processes.is_empty()
	}
}

/// `$PROCFILE_PATH` when set, otherwise `<app_dir>/Procfile`.
pub fn procfile_path(env: &EnvironmentMap, app_dir: &Path) -> PathBuf {
	match env.get(PROCFILE_PATH_VAR) {
		Some(path) if !path.is_empty() => PathBuf::from(path),
		_ => app_dir.join("Procfile"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_in_order_with_colons_in_commands() {
		let p = Procfile::parse(
			"web: python run_my_app.py -p $PORT -l $POORT\n\
			 # disabled: nothing\n\
			 \n\
			 worker: python run_my_worker.py --url=http://x:80\n\
			 broken line\n\
			 empty:\n",
		);
		let names: Vec<_> = p.processes.iter().map(|p| p.name.as_str()).collect();
		assert_eq!(names, ["web", "worker"]);
		assert_eq!(p.processes[0].command, "python run_my_app.py -p $PORT -l $POORT");
		assert_eq!(p.processes[1].command, "python run_my_worker.py --url=http://x:80");
	}

	#[test]
	fn duplicate_names_keep_first_position() {
		let p = Procfile::parse("web: a\nworker: b\nweb: c\n");
		assert_eq!(
			p.processes,
			vec![
				ProcessType { name: "web".into(), command: "c".into() },
				ProcessType { name: "worker".into(), command: "b".into() },
			]
		);
	}

	#[test]
	fn missing_file_is_empty() {
		let p = Procfile::load(Path::new("/definitely/not/here/Procfile")).unwrap();
		assert!(p.is_empty());
	}

	#[test]
	fn path_override_from_env() {
		let app = Path::new("/home/application/current");
		let mut env = EnvironmentMap::new();
		assert_eq!(procfile_path(&env, app), app.join("Procfile"));
		env.insert(PROCFILE_PATH_VAR.into(), "/tmp/Procfile2".into());
		assert_eq!(procfile_path(&env, app), PathBuf::from("/tmp/Procfile2"));
	}
}
