use std::path::Path;

use serde_yaml::{Mapping, Value};

pub const DEFAULT_DESCRIPTOR_FILES: &[&str] = &["unit.yaml", "unit.yml", "app.yaml", "app.yml"];

/// Loads the first descriptor found in `dir`, trying `candidates` in order.
///
/// Returns an empty mapping when no candidate exists, the file is empty, or
/// it is not valid YAML. Files that aren't UTF-8 are read as Latin-1.
pub fn load_app_descriptor<S: AsRef<str>>(dir: &Path, candidates: &[S]) -> Value {
	for name in candidates {
		let path = dir.join(name.as_ref());
		let bytes = match std::fs::read(&path) {
			Ok(b) => b,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
			Err(e) => {
				tracing::warn!("skipping unreadable descriptor {}: {}", path.display(), e);
				continue;
			}
		};
		tracing::debug!(path = %path.display(), "loading app descriptor");
		return parse_descriptor(&decode(bytes)).unwrap_or_else(|e| {
			tracing::warn!("ignoring {}: {}", path.display(), e);
			empty()
		});
	}
	empty()
}

fn parse_descriptor(text: &str) -> Result<Value, serde_yaml::Error> {
	let blank = text.lines().map(str::trim).all(|l| l.is_empty() || l.starts_with('#'));
	if blank {
		return Ok(empty());
	}
	match serde_yaml::from_str::<Value>(text)? {
		Value::Null => Ok(empty()),
		value => Ok(value),
	}
}

fn decode(bytes: Vec<u8>) -> String {
	match String::from_utf8(bytes) {
		Ok(s) => s,
		Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
	}
}

fn empty() -> Value {
	Value::Mapping(Mapping::new())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn latin1_bytes_are_decoded() {
		assert_eq!(decode(b"key: \xe1\xe9x".to_vec()), "key: áéx");
		assert_eq!(decode("key: áé".as_bytes().to_vec()), "key: áé");
	}

	#[test]
	fn empty_document_is_empty_mapping() {
		assert_eq!(parse_descriptor("").unwrap(), empty());
		assert_eq!(parse_descriptor("# only a comment\n").unwrap(), empty());
	}

	#[test]
	fn tab_indentation_is_an_error() {
		assert!(parse_descriptor("hooks:\n\tbuild:\n\t\t- foo_1\n").is_err());
	}
}
