use std::fmt;
use std::sync::{Arc, OnceLock};

use relive_primitives::{Artifact, UnitId};

use crate::{AlreadyInstalled, CapabilityError, Redefine, Redefined};

/// Shared handle to the process's redefinition rights.
///
/// Bootstrap code builds one and passes clones to every reload pipeline.
/// Clones all refer to the same underlying runtime.
#[derive(Clone)]
pub struct Capability(Arc<dyn Redefine>);

impl Capability {
	pub fn new<R: Redefine + 'static>(redefine: Arc<R>) -> Self {
		Self(redefine)
	}

	pub fn is_loaded(&self, unit: &UnitId) -> bool {
		self.0.is_loaded(unit)
	}

	pub fn redefine(&self, unit: &UnitId, artifact: &Artifact) -> Result<Redefined, CapabilityError> {
		self.0.redefine(unit, artifact)
	}

	/// Whether both handles refer to the same runtime.
	pub fn same_as(&self, other: &Capability) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Capability").field(&Arc::as_ptr(&self.0)).finish()
	}
}

/// `None` once sealed means the process will never be able to redefine.
static PROCESS_CAPABILITY: OnceLock<Option<Capability>> = OnceLock::new();

/// Publishes the process-wide capability. Must run during bootstrap, before
/// anything calls [`installed`]; the slot is decided exactly once.
pub fn install(capability: Capability) -> Result<(), AlreadyInstalled> {
	PROCESS_CAPABILITY.set(Some(capability)).map_err(|_| AlreadyInstalled)?;
	tracing::debug!("capability.installed");
	Ok(())
}

/// Returns the process-wide capability.
///
/// The first call on an empty slot seals it: a capability that was not
/// available then is never available later.
pub fn installed() -> Option<Capability> {
	PROCESS_CAPABILITY
		.get_or_init(|| {
			tracing::warn!("capability.sealed_absent");
			None
		})
		.clone()
}
