use relive_primitives::UnitId;
use thiserror::Error;

/// Why a redefinition request was refused. Each variant is a distinct
/// condition; none is ever reported as another.
#[derive(Debug, Error)]
pub enum CapabilityError {
	/// The process never acquired redefinition rights.
	#[error("redefinition capability not initialized")]
	Uninitialized,

	#[error("unit {unit} is not loaded in this process")]
	UnitNotFound { unit: UnitId },

	/// The runtime refused the new definition because it is structurally
	/// incompatible with the loaded one.
	#[error("unit {unit} cannot be modified: {reason}")]
	Unmodifiable { unit: UnitId, reason: Incompatibility },

	/// The artifact could not be loaded at all.
	#[error("invalid artifact for unit {unit}")]
	InvalidArtifact {
		unit: UnitId,
		#[source]
		source: LoadError,
	},
}

/// Why a unit could not be loaded for the first time.
#[derive(Debug, Error)]
pub enum BootstrapError {
	#[error("unit {unit} is already loaded")]
	AlreadyLoaded { unit: UnitId },

	#[error("invalid artifact for unit {unit}")]
	InvalidArtifact {
		unit: UnitId,
		#[source]
		source: LoadError,
	},
}

/// Structural difference between the loaded and the offered definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Incompatibility {
	#[error("artifact declares unit {declared:?}")]
	UnitMismatch { declared: String },

	#[error("ABI version {offered} differs from loaded version {loaded}")]
	AbiMismatch { loaded: u32, offered: u32 },

	#[error("layout {offered:#018x} differs from loaded layout {loaded:#018x}")]
	LayoutChanged { loaded: u64, offered: u64 },
}

/// Failure turning artifact bytes into a definition.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct LoadError {
	message: String,
	#[source]
	source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl LoadError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			source: None,
		}
	}

	pub fn with_source(message: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
		Self {
			message: message.into(),
			source: Some(Box::new(source)),
		}
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

/// Returned by [`install`](crate::install) when the process slot is already decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("process capability already installed or sealed as absent")]
pub struct AlreadyInstalled;
