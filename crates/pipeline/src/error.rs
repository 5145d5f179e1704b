use std::fmt;
use std::path::PathBuf;

use relive_capability::{Incompatibility, LoadError};
use relive_primitives::UnitId;
use thiserror::Error;

use crate::ToolchainError;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Not started; only seen when an attempt is dropped before it runs.
	Idle,
	Locating,
	Compiling,
	ReadingArtifact,
	Resolving,
	Redefining,
}

impl Stage {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Locating => "locating",
			Self::Compiling => "compiling",
			Self::ReadingArtifact => "reading_artifact",
			Self::Resolving => "resolving",
			Self::Redefining => "redefining",
		}
	}
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Kind of a [`ReloadError`], for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	CapabilityUnavailable,
	SourceNotFound,
	CompileFailed,
	ToolchainFailed,
	ArtifactUnreadable,
	UnitNotLoaded,
	IncompatibleRedefinition,
	InvalidArtifact,
	Cancelled,
}

impl ErrorKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::CapabilityUnavailable => "capability_unavailable",
			Self::SourceNotFound => "source_not_found",
			Self::CompileFailed => "compile_failed",
			Self::ToolchainFailed => "toolchain_failed",
			Self::ArtifactUnreadable => "artifact_unreadable",
			Self::UnitNotLoaded => "unit_not_loaded",
			Self::IncompatibleRedefinition => "incompatible_redefinition",
			Self::InvalidArtifact => "invalid_artifact",
			Self::Cancelled => "cancelled",
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Terminal failure of one reload attempt. The previously loaded definition
/// is still active whenever one of these is returned.
#[derive(Debug, Error)]
pub enum ReloadError {
	/// The process holds no redefinition rights. Nothing will succeed until
	/// the process is restarted with them.
	#[error("redefinition capability unavailable, cannot reload {unit}")]
	CapabilityUnavailable { unit: UnitId, stage: Stage },

	#[error("source file {path} for {unit} not found")]
	SourceNotFound { unit: UnitId, path: PathBuf },

	/// The toolchain ran and rejected the source. `diagnostics` is its
	/// diagnostic stream, byte for byte.
	#[error("couldn't compile source {path} for {unit}: {}", String::from_utf8_lossy(.diagnostics))]
	CompileFailed {
		unit: UnitId,
		path: PathBuf,
		status: Option<i32>,
		diagnostics: Vec<u8>,
	},

	/// The toolchain could not be run at all.
	#[error("toolchain failed while compiling {unit}")]
	ToolchainFailed {
		unit: UnitId,
		#[source]
		source: ToolchainError,
	},

	/// The toolchain reported success but its output cannot be read.
	#[error("compiled artifact {path} for {unit} could not be read")]
	ArtifactUnreadable {
		unit: UnitId,
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("unit {unit} is not loaded in the running process")]
	UnitNotLoaded { unit: UnitId },

	/// The runtime refused the swap. Retrying with the same artifact will
	/// fail the same way.
	#[error("unit {unit} cannot be redefined: {reason}")]
	IncompatibleRedefinition { unit: UnitId, reason: Incompatibility },

	#[error("artifact for {unit} could not be loaded")]
	InvalidArtifact {
		unit: UnitId,
		#[source]
		source: LoadError,
	},

	#[error("reload of {unit} cancelled before {stage}")]
	Cancelled { unit: UnitId, stage: Stage },
}

impl ReloadError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::CapabilityUnavailable { .. } => ErrorKind::CapabilityUnavailable,
			Self::SourceNotFound { .. } => ErrorKind::SourceNotFound,
			Self::CompileFailed { .. } => ErrorKind::CompileFailed,
			Self::ToolchainFailed { .. } => ErrorKind::ToolchainFailed,
			Self::ArtifactUnreadable { .. } => ErrorKind::ArtifactUnreadable,
			Self::UnitNotLoaded { .. } => ErrorKind::UnitNotLoaded,
			Self::IncompatibleRedefinition { .. } => ErrorKind::IncompatibleRedefinition,
			Self::InvalidArtifact { .. } => ErrorKind::InvalidArtifact,
			Self::Cancelled { .. } => ErrorKind::Cancelled,
		}
	}

	/// Stage the attempt failed in.
	pub fn stage(&self) -> Stage {
		match self {
			Self::CapabilityUnavailable { stage, .. } | Self::Cancelled { stage, .. } => *stage,
			Self::SourceNotFound { .. } => Stage::Locating,
			Self::CompileFailed { .. } | Self::ToolchainFailed { .. } => Stage::Compiling,
			Self::ArtifactUnreadable { .. } => Stage::ReadingArtifact,
			Self::UnitNotLoaded { .. } => Stage::Resolving,
			Self::IncompatibleRedefinition { .. } | Self::InvalidArtifact { .. } => Stage::Redefining,
		}
	}

	pub fn unit(&self) -> &UnitId {
		match self {
			Self::CapabilityUnavailable { unit, .. }
			| Self::SourceNotFound { unit, .. }
			| Self::CompileFailed { unit, .. }
			| Self::ToolchainFailed { unit, .. }
			| Self::ArtifactUnreadable { unit, .. }
			| Self::UnitNotLoaded { unit }
			| Self::IncompatibleRedefinition { unit, .. }
			| Self::InvalidArtifact { unit, .. }
			| Self::Cancelled { unit, .. } => unit,
		}
	}

	/// Toolchain diagnostics, for compile failures.
	pub fn diagnostics(&self) -> Option<&[u8]> {
		match self {
			Self::CompileFailed { diagnostics, .. } => Some(diagnostics),
			_ => None,
		}
	}

	/// Whether another attempt could succeed without restarting the process,
	/// once the caller has fixed whatever caused this one to fail.
	pub fn is_retryable(&self) -> bool {
		match self.kind() {
			ErrorKind::SourceNotFound
			| ErrorKind::CompileFailed
			| ErrorKind::ToolchainFailed
			| ErrorKind::ArtifactUnreadable
			| ErrorKind::InvalidArtifact
			| ErrorKind::Cancelled => true,
			ErrorKind::CapabilityUnavailable | ErrorKind::UnitNotLoaded | ErrorKind::IncompatibleRedefinition => false,
		}
	}
}
