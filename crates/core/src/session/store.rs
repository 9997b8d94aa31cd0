//! Snapshot persistence.

use std::path::{Path, PathBuf};

use chairside_protocol::SessionFile;
use thiserror::Error;

use super::state::SessionState;

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("failed to read session snapshot {path}: {source}")]
	Read { path: PathBuf, source: std::io::Error },

	#[error("failed to write session snapshot {path}: {source}")]
	Write { path: PathBuf, source: std::io::Error },

	#[error("session snapshot {path} is corrupt: {source}")]
	Corrupt { path: PathBuf, source: serde_json::Error },
}

impl StoreError {
	pub fn is_corrupt(&self) -> bool {
		matches!(self, StoreError::Corrupt { .. })
	}
}

/// File-backed snapshot store with atomic overwrite.
#[derive(Debug, Clone)]
pub struct SessionStore {
	path: PathBuf,
}

impl SessionStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Reads the snapshot; `Ok(None)` when no file exists.
	pub fn load(&self) -> Result<Option<SessionState>, StoreError> {
		let content = match std::fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(source) => {
				return Err(StoreError::Read {
					path: self.path.clone(),
					source,
				});
			}
		};
		let file: SessionFile = serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
			path: self.path.clone(),
			source,
		})?;
		Ok(Some(SessionState::from_file(file)))
	}

	/// Writes the snapshot to a sibling temp file, then renames it over the target.
	pub fn save(&self, state: &SessionState) -> Result<(), StoreError> {
		let write_err = |source| StoreError::Write {
			path: self.path.clone(),
			source,
		};

		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent).map_err(write_err)?;
		}

		let json = serde_json::to_string_pretty(&state.to_file()).map_err(|e| write_err(std::io::Error::other(e)))?;
		let tmp_path = self.tmp_path();
		std::fs::write(&tmp_path, json).map_err(write_err)?;
		if let Err(source) = std::fs::rename(&tmp_path, &self.path) {
			let _ = std::fs::remove_file(&tmp_path);
			return Err(write_err(source));
		}
		Ok(())
	}

	/// Removes the snapshot. Returns `true` when one existed.
	pub fn clear(&self) -> Result<bool, StoreError> {
		match std::fs::remove_file(&self.path) {
			Ok(()) => Ok(true),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(source) => Err(StoreError::Write {
				path: self.path.clone(),
				source,
			}),
		}
	}

	fn tmp_path(&self) -> PathBuf {
		let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "session".into());
		name.push(".tmp");
		self.path.with_file_name(name)
	}
}
