//! Shell-sourceable environment file.
//!
//! Every value is written inside single quotes, with `'` spelled `'\''`. A
//! POSIX shell sourcing the file reproduces each value byte for byte,
//! newlines included. [`parse`] reads the file back with a small shell-word
//! lexer, so a quoted value spanning several lines stays one entry.

use std::fs::Permissions;
use std::io::Write;
use std::iter::Peekable;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::str::Chars;

use crate::env::{is_valid_name, EnvironmentMap};
use crate::error::{Error, Result};
use crate::time;

/// Mode given to a file that did not exist before.
const NEW_FILE_MODE: u32 = 0o644;

/// Names that are not shell identifiers are left out with a warning.
pub fn render(env: &EnvironmentMap, timestamp: &str, agent_name: &str) -> String {
	let mut out = format!("# generated by {} at {}\n", agent_name, timestamp);
	for (name, value) in env {
		if !is_valid_name(name) {
			tracing::warn!(name = name.as_str(), "skipping variable with invalid name");
			continue;
		}
		out.push_str("export ");
		out.push_str(name);
		out.push('=');
		out.push_str(&quote(value));
		out.push('\n');
	}
	out
}

fn quote(value: &str) -> String {
	format!("'{}'", value.replace('\'', r"'\''"))
}

/// Writes `env` to `path`, replacing any previous file atomically.
pub fn serialize(env: &EnvironmentMap, path: &Path, agent_name: &str) -> Result<()> {
	let content = render(env, &time::now_timestamp(), agent_name);
	write_atomic(path, content.as_bytes())?;
	tracing::debug!(path = %path.display(), vars = env.len(), "wrote env file");
	Ok(())
}

/// Writes through a temp file in the target's directory, then renames it over `path`.
///
/// The target keeps its mode; a new file gets 0644.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
	let dir = match path.parent() {
		Some(p) if !p.as_os_str().is_empty() => p,
		_ => Path::new("."),
	};
	let permissions = match std::fs::metadata(path) {
		Ok(meta) => meta.permissions(),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Permissions::from_mode(NEW_FILE_MODE),
		Err(e) => return Err(Error::io(path, e)),
	};
	let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
	tmp.write_all(data).map_err(|e| Error::io(tmp.path(), e))?;
	tmp.as_file()
		.set_permissions(permissions)
		.map_err(|e| Error::io(tmp.path(), e))?;
	tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
	tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
	Ok(())
}

pub fn parse(path: &Path) -> Result<EnvironmentMap> {
	let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
	Ok(parse_str(&content))
}

/// Like [`parse`], but a missing file is an empty environment.
pub fn load_or_empty(path: &Path) -> Result<EnvironmentMap> {
	match parse(path) {
		Err(e) if e.is_not_found() => Ok(EnvironmentMap::new()),
		other => other,
	}
}

pub fn parse_str(content: &str) -> EnvironmentMap {
	let mut lexer = Lexer { chars: content.chars().peekable() };
	let mut env = EnvironmentMap::new();

	while lexer.skip_blank() {
		if lexer.chars.peek() == Some(&'#') {
			lexer.skip_line();
			continue;
		}

		let mut name = lexer.bare_token();
		if name == "export" {
			lexer.skip_spaces();
			name = lexer.bare_token();
		}
		if !is_valid_name(&name) || lexer.chars.next_if_eq(&'=').is_none() {
			lexer.skip_line();
			continue;
		}

		let value = lexer.word();
		lexer.skip_line();
		env.insert(name, value);
	}

	env
}

struct Lexer<'a> {
	chars: Peekable<Chars<'a>>,
}

impl Lexer<'_> {
	/// Skips whitespace and newlines. Returns false at end of input.
	fn skip_blank(&mut self) -> bool {
		while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
		self.chars.peek().is_some()
	}

	fn skip_spaces(&mut self) {
		while self.chars.next_if(|&c| c == ' ' || c == '\t').is_some() {}
	}

	fn skip_line(&mut self) {
		for c in self.chars.by_ref() {
			if c == '\n' {
				break;
			}
		}
	}

	/// Unquoted run of characters up to whitespace or `=`.
	fn bare_token(&mut self) -> String {
		let mut token = String::new();
		while let Some(c) = self.chars.next_if(|&c| c != '=' && !c.is_whitespace()) {
			token.push(c);
		}
		token
	}

	/// One shell word: quoted and bare segments up to unquoted whitespace.
	fn word(&mut self) -> String {
		let mut out = String::new();
		while let Some(&c) = self.chars.peek() {
			match c {
				' ' | '\t' | '\n' => break,
				'\'' => {
					self.chars.next();
					for c in self.chars.by_ref() {
						if c == '\'' {
							break;
						}
						out.push(c);
					}
				}
				'"' => {
					self.chars.next();
					self.double_quoted(&mut out);
				}
				'\\' => {
					self.chars.next();
					match self.chars.next() {
						Some('\n') | None => {}
						Some(escaped) => out.push(escaped),
					}
				}
				_ => {
					self.chars.next();
					out.push(c);
				}
			}
		}
		out
	}

	fn double_quoted(&mut self, out: &mut String) {
		while let Some(c) = self.chars.next() {
			match c {
				'"' => return,
				'\\' => match self.chars.next() {
					Some('\n') => {}
					Some(escaped @ ('$' | '`' | '"' | '\\')) => out.push(escaped),
					Some(other) => {
						out.push('\\');
						out.push(other);
					}
					None => out.push('\\'),
				},
				_ => out.push(c),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn env(pairs: &[(&str, &str)]) -> EnvironmentMap {
		pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	#[test]
	fn render_writes_header_and_one_export_per_var() {
		let e = env(&[("DATABASE_HOST", "localhost"), ("DATABASE_USER", "root")]);
		let out = render(&e, "2026-02-14 09:47:05", "unit-agent");
		assert_eq!(
			out,
			"# generated by unit-agent at 2026-02-14 09:47:05\n\
			 export DATABASE_HOST='localhost'\n\
			 export DATABASE_USER='root'\n"
		);
	}

	#[test]
	fn single_quotes_are_closed_escaped_and_reopened() {
		let out = render(&env(&[("A", "it's")]), "t", "a");
		assert!(out.ends_with("export A='it'\\''s'\n"), "got: {}", out);
	}

	#[test]
	fn parses_hand_written_assignments() {
		let content = "\
# comment line
export A=B
export C=\"C D\"
export b=888
export B='9\"1'
export D=X=y
  export F='a(a'
MY_awesome_BIG_name=something
echo not an assignment
export 1BAD=x
export E=\"say \\\"hi\\\" \\$HOME \\n\"
export G=a\\ b # trailing comment
";
		let got = parse_str(content);
		assert_eq!(
			got,
			env(&[
				("A", "B"),
				("C", "C D"),
				("b", "888"),
				("B", "9\"1"),
				("D", "X=y"),
				("F", "a(a"),
				("MY_awesome_BIG_name", "something"),
				("E", "say \"hi\" $HOME \\n"),
				("G", "a b"),
			])
		);
	}

	#[test]
	fn quoted_newlines_stay_in_one_entry() {
		let got = parse_str("export M='line one\nexport X=2\nline three'\nexport N=1\n");
		assert_eq!(got, env(&[("M", "line one\nexport X=2\nline three"), ("N", "1")]));
	}

	#[test]
	fn empty_values() {
		let got = parse_str("export A=''\nexport B=\nexport C=\"\"\n");
		assert_eq!(got, env(&[("A", ""), ("B", ""), ("C", "")]));
	}

	#[test]
	fn render_then_parse_is_identity() {
		let e = env(&[
			("A", "B"),
			("C", "C D"),
			("b", "888"),
			("B", "9\"1"),
			("D", "X=y"),
			("F", "a(a) + ("),
			("MY_awesome_BIG_name", "some'thin'g'"),
			("JSON", r#"[{"a": "b", "c": {"d": "f"}}]"#),
			("SLASHED", "a\\a escaped \\\" some \\\""),
			("EXEC", "a: `echo hey` b: $(echo again)"),
			("MULTILINE", "my\nmulti\"line\", with ' quotes ' yay'\nvariable'\n'"),
			("TABS", "\tindented\t"),
			("EMPTY", ""),
		]);
		assert_eq!(parse_str(&render(&e, "now", "unit-agent")), e);
	}

	#[test]
	fn invalid_names_are_never_written() {
		let e = env(&[
			("my-var", "1"),
			("X; touch /tmp/owned; Y", "2"),
			("1ST", "3"),
			("", "4"),
			("GOOD", "5"),
		]);
		let out = render(&e, "now", "unit-agent");
		assert_eq!(out, "# generated by unit-agent at now\nexport GOOD='5'\n");
		assert_eq!(parse_str(&out), env(&[("GOOD", "5")]));
	}
}
