use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use relive_capability::{Capability, CapabilityError};
use relive_primitives::{Artifact, SourceLayout, UnitId};
use tokio_util::sync::CancellationToken;

use crate::locks::UnitLocks;
use crate::{CommandToolchain, Compilation, ReloadConfig, ReloadError, Stage, Toolchain, ToolchainError};

/// Receipt for a successful reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reloaded {
	pub unit: UnitId,
	/// Generation of the definition now active.
	pub generation: u64,
	pub artifact_len: usize,
	pub elapsed: Duration,
}

/// Recompiles units from source and swaps them into the running process.
///
/// The capability is passed in rather than looked up, so tests can hand in
/// a fake and hosts can hand in the one they bootstrapped. A pipeline built
/// without one fails every reload with
/// [`ReloadError::CapabilityUnavailable`] before touching the filesystem.
pub struct ReloadPipeline {
	layout: SourceLayout,
	toolchain: Arc<dyn Toolchain>,
	capability: Option<Capability>,
	locks: UnitLocks,
}

impl ReloadPipeline {
	pub fn new(layout: SourceLayout, toolchain: Arc<dyn Toolchain>, capability: Option<Capability>) -> Self {
		Self {
			layout,
			toolchain,
			capability,
			locks: UnitLocks::default(),
		}
	}

	/// Builds a pipeline running the configured compiler, which must be on `PATH`.
	pub fn from_config(config: &ReloadConfig, capability: Option<Capability>) -> Result<Self, ToolchainError> {
		let toolchain = CommandToolchain::from_config(&config.toolchain)?;
		Ok(Self::new(config.layout(), Arc::new(toolchain), capability))
	}

	pub fn layout(&self) -> &SourceLayout {
		&self.layout
	}

	pub fn toolchain(&self) -> &dyn Toolchain {
		self.toolchain.as_ref()
	}

	pub fn has_capability(&self) -> bool {
		self.capability.is_some()
	}

	pub fn source_path(&self, unit: &UnitId) -> PathBuf {
		self.layout.source_path(unit)
	}

	pub fn artifact_path(&self, unit: &UnitId) -> PathBuf {
		self.layout.artifact_path(unit, self.toolchain.artifact_extension())
	}

	/// Recompiles `unit` and redefines it in the running process.
	pub fn reload(&self, unit: &UnitId) -> Result<Reloaded, ReloadError> {
		self.reload_with(unit, &CancellationToken::new())
	}

	/// Like [`Self::reload`], abandoning the attempt if `cancel` fires before
	/// the redefinition is issued. A redefinition already issued always runs
	/// to completion.
	pub fn reload_with(&self, unit: &UnitId, cancel: &CancellationToken) -> Result<Reloaded, ReloadError> {
		let span = tracing::info_span!("reload", %unit);
		let _enter = span.enter();
		let started = Instant::now();

		let result = self.run(unit, cancel, started);
		match &result {
			Ok(reloaded) => tracing::info!(
				generation = reloaded.generation,
				bytes = reloaded.artifact_len,
				elapsed_ms = reloaded.elapsed.as_millis() as u64,
				"reload.done"
			),
			Err(err) => tracing::warn!(kind = %err.kind(), stage = %err.stage(), error = %err, "reload.failed"),
		}
		result
	}

	/// Locates and compiles `unit` without redefining it. The toolchain's
	/// verdict is returned as-is, failing status included.
	pub fn compile(&self, unit: &UnitId) -> Result<Compilation, ReloadError> {
		let _guard = self.locks.lock(unit);
		let source = self.locate(unit)?;
		enter(Stage::Compiling);
		self.clear_artifact(unit)?;
		self.toolchain
			.compile(&source, &CancellationToken::new())
			.map_err(|source| toolchain_failed(unit, source))
	}

	fn run(&self, unit: &UnitId, cancel: &CancellationToken, started: Instant) -> Result<Reloaded, ReloadError> {
		let Some(capability) = &self.capability else {
			return Err(ReloadError::CapabilityUnavailable {
				unit: unit.clone(),
				stage: Stage::Locating,
			});
		};

		let _guard = self.locks.lock(unit);

		let source = self.locate(unit)?;

		checkpoint(unit, cancel, Stage::Compiling)?;
		enter(Stage::Compiling);
		self.clear_artifact(unit)?;
		let compilation = self
			.toolchain
			.compile(&source, cancel)
			.map_err(|source| toolchain_failed(unit, source))?;
		if !compilation.succeeded() {
			return Err(ReloadError::CompileFailed {
				unit: unit.clone(),
				path: source,
				status: compilation.status,
				diagnostics: compilation.diagnostics,
			});
		}

		checkpoint(unit, cancel, Stage::ReadingArtifact)?;
		enter(Stage::ReadingArtifact);
		let artifact_path = self.artifact_path(unit);
		let artifact = Artifact::read(&artifact_path).map_err(|source| ReloadError::ArtifactUnreadable {
			unit: unit.clone(),
			path: artifact_path,
			source,
		})?;

		enter(Stage::Resolving);
		if !capability.is_loaded(unit) {
			return Err(ReloadError::UnitNotLoaded { unit: unit.clone() });
		}

		// Last point at which the attempt may be abandoned.
		checkpoint(unit, cancel, Stage::Redefining)?;
		enter(Stage::Redefining);
		let redefined = capability
			.redefine(unit, &artifact)
			.map_err(|err| redefine_failed(unit, err))?;

		Ok(Reloaded {
			unit: unit.clone(),
			generation: redefined.generation,
			artifact_len: artifact.len(),
			elapsed: started.elapsed(),
		})
	}

	/// Deletes the previous attempt's output, so whatever is read after
	/// compiling was written by this attempt's toolchain run.
	fn clear_artifact(&self, unit: &UnitId) -> Result<(), ReloadError> {
		let path = self.artifact_path(unit);
		match std::fs::remove_file(&path) {
			Ok(()) => {
				tracing::trace!(path = %path.display(), "reload.artifact_cleared");
				Ok(())
			}
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(source) => Err(ReloadError::ArtifactUnreadable {
				unit: unit.clone(),
				path,
				source,
			}),
		}
	}

	fn locate(&self, unit: &UnitId) -> Result<PathBuf, ReloadError> {
		enter(Stage::Locating);
		let source = self.layout.source_path(unit);
		if !source.is_file() {
			return Err(ReloadError::SourceNotFound {
				unit: unit.clone(),
				path: source,
			});
		}
		Ok(source)
	}
}

fn enter(stage: Stage) {
	tracing::debug!(%stage, "reload.stage");
}

fn checkpoint(unit: &UnitId, cancel: &CancellationToken, next: Stage) -> Result<(), ReloadError> {
	if cancel.is_cancelled() {
		return Err(ReloadError::Cancelled {
			unit: unit.clone(),
			stage: next,
		});
	}
	Ok(())
}

fn toolchain_failed(unit: &UnitId, source: ToolchainError) -> ReloadError {
	match source {
		ToolchainError::Cancelled => ReloadError::Cancelled {
			unit: unit.clone(),
			stage: Stage::Compiling,
		},
		source => ReloadError::ToolchainFailed {
			unit: unit.clone(),
			source,
		},
	}
}

fn redefine_failed(unit: &UnitId, err: CapabilityError) -> ReloadError {
	match err {
		CapabilityError::Uninitialized => ReloadError::CapabilityUnavailable {
			unit: unit.clone(),
			stage: Stage::Redefining,
		},
		CapabilityError::UnitNotFound { unit } => ReloadError::UnitNotLoaded { unit },
		CapabilityError::Unmodifiable { unit, reason } => ReloadError::IncompatibleRedefinition { unit, reason },
		CapabilityError::InvalidArtifact { unit, source } => ReloadError::InvalidArtifact { unit, source },
	}
}
