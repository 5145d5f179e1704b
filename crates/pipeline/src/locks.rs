use std::collections::HashSet;

use parking_lot::{Condvar, Mutex};
use relive_primitives::UnitId;

/// Admits at most one reload per unit at a time.
#[derive(Debug, Default)]
pub(crate) struct UnitLocks {
	in_flight: Mutex<HashSet<UnitId>>,
	released: Condvar,
}

impl UnitLocks {
	/// Blocks until no other attempt holds `unit`.
	pub fn lock(&self, unit: &UnitId) -> UnitGuard<'_> {
		let mut in_flight = self.in_flight.lock();
		while in_flight.contains(unit) {
			tracing::trace!(%unit, "reload.waiting");
			self.released.wait(&mut in_flight);
		}
		in_flight.insert(unit.clone());
		UnitGuard {
			locks: self,
			unit: unit.clone(),
		}
	}
}

pub(crate) struct UnitGuard<'a> {
	locks: &'a UnitLocks,
	unit: UnitId,
}

impl Drop for UnitGuard<'_> {
	fn drop(&mut self) {
		self.locks.in_flight.lock().remove(&self.unit);
		self.locks.released.notify_all();
	}
}
