//! Environment maps passed explicitly between the agent's components.
//!
//! Nothing here reads or writes the process-wide environment except
//! [`ambient`], which takes a one-time snapshot at startup.

use std::collections::BTreeMap;

pub type EnvironmentMap = BTreeMap<String, String>;

/// Snapshot of the agent's own environment. Non-UTF-8 entries are skipped.
pub fn ambient() -> EnvironmentMap {
	std::env::vars_os()
		.filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
		.collect()
}

/// `base` extended by `overrides`; overrides win on conflicting names.
pub fn merged(base: &EnvironmentMap, overrides: &EnvironmentMap) -> EnvironmentMap {
	let mut env = base.clone();
	env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
	env
}

pub fn is_valid_name(name: &str) -> bool {
	let mut chars = name.chars();
	match chars.next() {
		Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
		_ => return false,
	}
	chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Substitutes `$NAME` and `${NAME}` with values from `env`.
///
/// Unknown names and malformed references are left exactly as written.
pub fn expand(template: &str, env: &EnvironmentMap) -> String {
	let mut out = String::with_capacity(template.len());
	let mut rest = template;

	while let Some(pos) = rest.find('$') {
		out.push_str(&rest[..pos]);
		let after = &rest[pos + 1..];

		let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
			match braced.find('}') {
				Some(end) => (&braced[..end], end + 2),
				None => ("", 0),
			}
		} else {
			let end = after
				.find(|c: char| c != '_' && !c.is_ascii_alphanumeric())
				.unwrap_or(after.len());
			(&after[..end], end)
		};

		match env.get(name) {
			Some(value) if is_valid_name(name) => {
				out.push_str(value);
				rest = &after[consumed..];
			}
			_ => {
				out.push('$');
				rest = after;
			}
		}
	}

	out.push_str(rest);
	out
}
