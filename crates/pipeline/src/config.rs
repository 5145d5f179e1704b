//! `relive.toml` configuration.
//!
//! ```toml
//! source_root = "units"
//! source_extension = "rs"
//! units = ["demo.greeter"]
//!
//! [toolchain]
//! program = "rustc"
//! args = ["--edition", "2024", "--crate-type", "cdylib", "-o", "{artifact}", "{source}"]
//! artifact_extension = "so"
//! ```
//!
//! Every field is optional. A relative `source_root` is resolved against the
//! directory holding the config file.

use std::path::{Path, PathBuf};

use relive_primitives::{SourceLayout, UnitId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RELIVE_CONFIG";
/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "relive.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io { path: PathBuf, error: std::io::Error },

	#[error("invalid config {path}: {error}")]
	Parse { path: PathBuf, error: toml::de::Error },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
	pub source_root: PathBuf,
	pub source_extension: String,
	/// Units a host loads at startup.
	pub units: Vec<UnitId>,
	pub toolchain: ToolchainConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
	pub program: String,
	pub args: Vec<String>,
	pub artifact_extension: String,
}

impl Default for ReloadConfig {
	fn default() -> Self {
		Self {
			source_root: PathBuf::from("."),
			source_extension: "rs".to_string(),
			units: Vec::new(),
			toolchain: ToolchainConfig::default(),
		}
	}
}

impl Default for ToolchainConfig {
	fn default() -> Self {
		Self {
			program: "rustc".to_string(),
			args: ["--edition", "2024", "--crate-type", "cdylib", "-o", "{artifact}", "{source}"]
				.into_iter()
				.map(String::from)
				.collect(),
			artifact_extension: std::env::consts::DLL_EXTENSION.to_string(),
		}
	}
}

impl ReloadConfig {
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let mut config = Self::parse(&content).map_err(|error| ConfigError::Parse {
			path: path.to_path_buf(),
			error,
		})?;
		if config.source_root.is_relative()
			&& let Some(dir) = path.parent()
		{
			config.source_root = dir.join(&config.source_root);
		}
		tracing::debug!(path = %path.display(), "config.loaded");
		Ok(config)
	}

	pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(content)
	}

	/// Loads `$RELIVE_CONFIG` if set, else `./relive.toml` if present, else defaults.
	pub fn discover() -> Result<Self, ConfigError> {
		if let Some(path) = std::env::var_os(CONFIG_ENV) {
			return Self::load(Path::new(&path));
		}
		let local = Path::new(CONFIG_FILE);
		if local.exists() {
			return Self::load(local);
		}
		Ok(Self::default())
	}

	pub fn layout(&self) -> SourceLayout {
		SourceLayout::new(&self.source_root, &self.source_extension)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_config_is_default() {
		assert_eq!(ReloadConfig::parse("").unwrap(), ReloadConfig::default());
	}

	#[test]
	fn partial_toolchain_keeps_other_defaults() {
		let config = ReloadConfig::parse(
			r#"
			units = ["a.b.Foo"]

			[toolchain]
			program = "javac"
			"#,
		)
		.unwrap();

		assert_eq!(config.units, vec![UnitId::new("a.b.Foo").unwrap()]);
		assert_eq!(config.toolchain.program, "javac");
		assert_eq!(config.toolchain.args, ToolchainConfig::default().args);
	}

	#[test]
	fn invalid_unit_names_are_parse_errors() {
		assert!(ReloadConfig::parse(r#"units = ["a..b"]"#).is_err());
	}

	#[test]
	fn load_resolves_root_against_config_dir() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join(CONFIG_FILE);
		std::fs::write(&path, "source_root = \"units\"\nsource_extension = \"java\"\n").unwrap();

		let config = ReloadConfig::load(&path).unwrap();

		assert_eq!(config.source_root, dir.path().join("units"));
		let unit = UnitId::new("a.Foo").unwrap();
		assert_eq!(config.layout().source_path(&unit), dir.path().join("units/a/Foo.java"));
	}

	#[test]
	fn load_reports_missing_and_malformed_files() {
		let dir = tempfile::tempdir().unwrap();
		let missing = ReloadConfig::load(&dir.path().join("nope.toml")).unwrap_err();
		assert!(matches!(missing, ConfigError::Io { .. }));

		let path = dir.path().join(CONFIG_FILE);
		std::fs::write(&path, "units = 3").unwrap();
		let malformed = ReloadConfig::load(&path).unwrap_err();
		assert!(matches!(malformed, ConfigError::Parse { .. }));
	}
}
