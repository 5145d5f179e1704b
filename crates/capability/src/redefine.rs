use relive_primitives::{Artifact, UnitId};

use crate::CapabilityError;

/// The single operation the runtime grants: replace a loaded unit's definition.
///
/// Implementors must apply a redefinition entirely or not at all. A failed
/// call leaves the previously loaded definition active.
pub trait Redefine: Send + Sync {
	/// Whether `unit` is currently loaded.
	fn is_loaded(&self, unit: &UnitId) -> bool;

	fn redefine(&self, unit: &UnitId, artifact: &Artifact) -> Result<Redefined, CapabilityError>;
}

/// Receipt for an applied redefinition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redefined {
	pub unit: UnitId,
	/// Generation stamped on the newly installed definition.
	pub generation: u64,
}
