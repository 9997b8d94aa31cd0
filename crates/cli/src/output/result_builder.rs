use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::output::format::OutputFormat;
use crate::output::model::{Artifact, ArtifactType, CommandError, CommandResult, Diagnostic, DiagnosticLevel, ErrorCode, SCHEMA_VERSION};

/// Accumulates the pieces of a [`CommandResult`] while a command runs.
///
/// The elapsed time is measured from [`ResultBuilder::new`] to
/// [`ResultBuilder::build`].
pub struct ResultBuilder<T: Serialize> {
	command: String,
	started: Instant,
	data: Option<T>,
	error: Option<CommandError>,
	artifacts: Vec<Artifact>,
	diagnostics: Vec<Diagnostic>,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			started: Instant::now(),
			data: None,
			error: None,
			artifacts: Vec::new(),
			diagnostics: Vec::new(),
		}
	}

	pub fn data(self, data: T) -> Self {
		Self { data: Some(data), ..self }
	}

	pub fn error(self, code: ErrorCode, message: impl Into<String>) -> Self {
		let message = message.into();
		Self {
			error: Some(CommandError { code, message }),
			..self
		}
	}

	pub fn artifact(mut self, kind: ArtifactType, path: impl Into<PathBuf>) -> Self {
		self.artifacts.push(Artifact { kind, path: path.into() });
		self
	}

	pub fn diagnostic(mut self, level: DiagnosticLevel, message: impl Into<String>) -> Self {
		let message = message.into();
		self.diagnostics.push(Diagnostic { level, message });
		self
	}

	/// A result is `ok` only with data and without an error.
	pub fn build(self) -> CommandResult<T> {
		let ok = self.error.is_none() && self.data.is_some();
		CommandResult {
			schema_version: SCHEMA_VERSION,
			ok,
			command: self.command,
			data: self.data,
			error: self.error,
			duration_ms: Some(self.started.elapsed().as_millis() as u64),
			artifacts: self.artifacts,
			diagnostics: self.diagnostics,
		}
	}
}

pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	let _ = write_result(&mut io::stdout().lock(), result, format);
}

/// Renders `result` to `out`; write errors on a closed stdout are the caller's to ignore.
pub fn write_result<T: Serialize>(out: &mut impl Write, result: &CommandResult<T>, format: OutputFormat) -> io::Result<()> {
	let value = serde_json::to_value(result).map_err(io::Error::other)?;
	match format {
		OutputFormat::Toon => writeln!(out, "{}", toon::encode(&value, None)),
		OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&value).map_err(io::Error::other)?),
		OutputFormat::Ndjson => writeln!(out, "{value}"),
		OutputFormat::Text => write_text(out, result, &value),
	}
}

fn write_text<T: Serialize>(out: &mut impl Write, result: &CommandResult<T>, value: &Value) -> io::Result<()> {
	match (&result.error, value.get("data")) {
		(Some(error), _) => writeln!(out, "{}: {}", error.code, error.message)?,
		(None, Some(Value::Object(fields))) => {
			let width = fields.keys().map(String::len).max().unwrap_or(0);
			for (key, field) in fields {
				match field {
					Value::String(s) => writeln!(out, "{key:width$}  {s}")?,
					Value::Null => writeln!(out, "{key:width$}  -")?,
					other => writeln!(out, "{key:width$}  {other}")?,
				}
			}
		}
		(None, Some(other)) => writeln!(out, "{other}")?,
		(None, None) => {}
	}

	for diag in &result.diagnostics {
		writeln!(out, "{}: {}", diag.level.as_str(), diag.message)?;
	}
	for artifact in &result.artifacts {
		writeln!(out, "wrote {}", artifact.path.display())?;
	}
	Ok(())
}
