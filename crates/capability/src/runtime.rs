use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use relive_primitives::{Artifact, UnitId};

use crate::{BootstrapError, CapabilityError, Incompatibility, LoadError, Redefine, Redefined};

/// Structural identity of a definition. Only definitions with equal shapes
/// may replace one another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
	/// Unit name the artifact declares for itself.
	pub unit: String,
	pub abi_version: u32,
	pub layout: u64,
}

impl Shape {
	/// Checks that `offered` can take the place of `self`.
	pub fn accepts(&self, offered: &Shape) -> Result<(), Incompatibility> {
		if offered.unit != self.unit {
			return Err(Incompatibility::UnitMismatch {
				declared: offered.unit.clone(),
			});
		}
		if offered.abi_version != self.abi_version {
			return Err(Incompatibility::AbiMismatch {
				loaded: self.abi_version,
				offered: offered.abi_version,
			});
		}
		if offered.layout != self.layout {
			return Err(Incompatibility::LayoutChanged {
				loaded: self.layout,
				offered: offered.layout,
			});
		}
		Ok(())
	}
}

/// A loaded, executable definition of a unit.
pub trait Definition: Send + Sync + 'static {
	fn shape(&self) -> &Shape;
}

/// Turns artifact bytes into a [`Definition`].
///
/// The runtime never calls a loader from two threads at once.
pub trait Loader: Send + Sync + 'static {
	type Definition: Definition;

	fn load(&self, unit: &UnitId, artifact: &Artifact) -> Result<Self::Definition, LoadError>;

	/// Called once `definition` has been accepted and is about to be
	/// installed. Definitions the runtime refuses are dropped without a
	/// commit.
	fn commit(&self, _unit: &UnitId, _definition: &Self::Definition) {}
}

/// Monotonic generation clock; the first generation is 1.
#[derive(Debug, Default)]
struct GenerationClock {
	last: AtomicU64,
}

impl GenerationClock {
	fn next(&self) -> u64 {
		self.last.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

/// A definition together with the generation it was installed at.
pub struct Installed<D> {
	definition: D,
	generation: u64,
}

impl<D> Installed<D> {
	pub fn generation(&self) -> u64 {
		self.generation
	}
}

impl<D> Deref for Installed<D> {
	type Target = D;

	fn deref(&self) -> &D {
		&self.definition
	}
}

struct UnitSlot<D> {
	id: UnitId,
	current: ArcSwap<Installed<D>>,
}

/// Live handle to a loaded unit.
///
/// Every handle for a unit shares one slot, so a redefinition is visible
/// through all of them. [`UnitRef::current`] returns a snapshot that stays
/// valid even if the unit is redefined while it is held.
pub struct UnitRef<D> {
	slot: Arc<UnitSlot<D>>,
}

impl<D> UnitRef<D> {
	fn new(id: UnitId, definition: D, generation: u64) -> Self {
		Self {
			slot: Arc::new(UnitSlot {
				id,
				current: ArcSwap::from_pointee(Installed { definition, generation }),
			}),
		}
	}

	pub fn id(&self) -> &UnitId {
		&self.slot.id
	}

	pub fn current(&self) -> Arc<Installed<D>> {
		self.slot.current.load_full()
	}

	pub fn generation(&self) -> u64 {
		self.slot.current.load().generation
	}

	/// Whether both handles refer to the same unit slot.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.slot, &other.slot)
	}

	fn install(&self, definition: D, generation: u64) {
		self.slot.current.store(Arc::new(Installed { definition, generation }));
	}
}

impl<D> Clone for UnitRef<D> {
	fn clone(&self) -> Self {
		Self {
			slot: Arc::clone(&self.slot),
		}
	}
}

impl<D> fmt::Debug for UnitRef<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("UnitRef")
			.field("id", &self.slot.id)
			.field("generation", &self.generation())
			.finish()
	}
}

/// Table of loaded units and the sole writer of their definitions.
pub struct Runtime<L: Loader> {
	loader: L,
	units: RwLock<HashMap<UnitId, UnitRef<L::Definition>>>,
	/// Serializes every load and redefinition process-wide.
	gate: Mutex<()>,
	generations: GenerationClock,
}

impl<L: Loader> Runtime<L> {
	pub fn new(loader: L) -> Self {
		Self {
			loader,
			units: RwLock::new(HashMap::new()),
			gate: Mutex::new(()),
			generations: GenerationClock::default(),
		}
	}

	pub fn loader(&self) -> &L {
		&self.loader
	}

	/// Loads a unit for the first time. This is bootstrap, not redefinition:
	/// the unit must not already be loaded.
	pub fn load(&self, unit: UnitId, artifact: &Artifact) -> Result<UnitRef<L::Definition>, BootstrapError> {
		let _gate = self.gate.lock();
		if self.units.read().contains_key(&unit) {
			return Err(BootstrapError::AlreadyLoaded { unit });
		}

		let definition = match self.loader.load(&unit, artifact) {
			Ok(definition) => definition,
			Err(source) => return Err(BootstrapError::InvalidArtifact { unit, source }),
		};
		let declared = &definition.shape().unit;
		if declared != unit.as_str() {
			let source = LoadError::new(format!("artifact declares unit {declared:?}"));
			return Err(BootstrapError::InvalidArtifact { unit, source });
		}

		self.loader.commit(&unit, &definition);
		let generation = self.generations.next();
		let unit_ref = UnitRef::new(unit.clone(), definition, generation);
		self.units.write().insert(unit.clone(), unit_ref.clone());
		tracing::info!(%unit, generation, "unit.loaded");
		Ok(unit_ref)
	}

	pub fn unit(&self, unit: &UnitId) -> Option<UnitRef<L::Definition>> {
		self.units.read().get(unit).cloned()
	}

	/// Loaded unit identities, sorted.
	pub fn units(&self) -> Vec<UnitId> {
		let mut units: Vec<_> = self.units.read().keys().cloned().collect();
		units.sort();
		units
	}
}

impl<L: Loader> Redefine for Runtime<L> {
	fn is_loaded(&self, unit: &UnitId) -> bool {
		self.units.read().contains_key(unit)
	}

	fn redefine(&self, unit: &UnitId, artifact: &Artifact) -> Result<Redefined, CapabilityError> {
		let _gate = self.gate.lock();
		let unit_ref = self
			.unit(unit)
			.ok_or_else(|| CapabilityError::UnitNotFound { unit: unit.clone() })?;

		let definition = self
			.loader
			.load(unit, artifact)
			.map_err(|source| CapabilityError::InvalidArtifact {
				unit: unit.clone(),
				source,
			})?;

		let current = unit_ref.current();
		if let Err(reason) = current.shape().accepts(definition.shape()) {
			tracing::warn!(%unit, %reason, "unit.redefine_refused");
			return Err(CapabilityError::Unmodifiable {
				unit: unit.clone(),
				reason,
			});
		}

		self.loader.commit(unit, &definition);
		let generation = self.generations.next();
		unit_ref.install(definition, generation);
		tracing::info!(%unit, from = current.generation(), to = generation, "unit.redefined");
		Ok(Redefined {
			unit: unit.clone(),
			generation,
		})
	}
}
