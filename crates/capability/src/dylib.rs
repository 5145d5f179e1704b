use std::ffi::CStr;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use libloading::{Library, Symbol};
use parking_lot::Mutex;
use relive_primitives::{Artifact, UnitId};
use tempfile::{TempDir, TempPath};

use crate::abi::{RELIVE_UNIT_ABI_V1, UNIT_ENTRY_V1, UnitDescriptorV1, UnitEntryV1};
use crate::{Definition, LoadError, Loader, Shape};

/// Loads unit artifacts that are native dynamic libraries.
///
/// Each artifact is copied into a fresh file in a private staging directory
/// before it is opened: the platform loader caches libraries by path, so
/// reopening the toolchain's output path would hand back the old code.
///
/// A library is closed and its staged file removed when its definition is
/// refused. Once committed it stays open for the loader's lifetime.
pub struct DylibLoader {
	/// Committed libraries are never closed. A replaced definition's code may
	/// still be running on another thread.
	pinned: Mutex<Vec<Staged>>,
	staging: TempDir,
}

#[derive(Clone)]
struct Staged {
	_library: Arc<Library>,
	file: Arc<TempPath>,
}

impl DylibLoader {
	pub fn new() -> std::io::Result<Self> {
		let staging = tempfile::Builder::new().prefix("relive-staging-").tempdir()?;
		Ok(Self {
			pinned: Mutex::new(Vec::new()),
			staging,
		})
	}

	pub fn staging_dir(&self) -> &Path {
		self.staging.path()
	}

	/// Number of libraries held open by committed definitions.
	pub fn pinned(&self) -> usize {
		self.pinned.lock().len()
	}

	fn stage(&self, unit: &UnitId, artifact: &Artifact) -> std::io::Result<TempPath> {
		let mut file = tempfile::Builder::new()
			.prefix(&format!("{unit}-"))
			.suffix(&format!(".{}", std::env::consts::DLL_EXTENSION))
			.tempfile_in(self.staging.path())?;
		file.write_all(artifact.bytes())?;
		file.flush()?;
		Ok(file.into_temp_path())
	}
}

impl Loader for DylibLoader {
	type Definition = DylibDefinition;

	fn load(&self, unit: &UnitId, artifact: &Artifact) -> Result<DylibDefinition, LoadError> {
		let path = self
			.stage(unit, artifact)
			.map_err(|e| LoadError::with_source("failed to stage artifact", e))?;

		// SAFETY: loading runs the library's initializers. Unit libraries are
		// produced by the configured toolchain from trusted sources.
		let library = unsafe { Library::new(&*path) }
			.map_err(|e| LoadError::with_source(format!("failed to open {}", path.display()), e))?;

		let descriptor: UnitDescriptorV1 = unsafe {
			let entry: Symbol<UnitEntryV1> = library
				.get(UNIT_ENTRY_V1)
				.map_err(|e| LoadError::with_source("missing relive_unit_v1 entry point", e))?;
			entry()
		};

		if descriptor.abi_version != RELIVE_UNIT_ABI_V1 {
			return Err(LoadError::new(format!(
				"unsupported unit ABI version {} (expected {RELIVE_UNIT_ABI_V1})",
				descriptor.abi_version
			)));
		}
		if descriptor.name.is_null() {
			return Err(LoadError::new("unit descriptor has no name"));
		}
		// SAFETY: non-null and documented as a static null-terminated string.
		let name = unsafe { CStr::from_ptr(descriptor.name) }
			.to_str()
			.map_err(|e| LoadError::with_source("unit name is not UTF-8", e))?
			.to_owned();

		tracing::debug!(%unit, path = %path.display(), "dylib.opened");

		Ok(DylibDefinition {
			shape: Shape {
				unit: name,
				abi_version: descriptor.abi_version,
				layout: descriptor.layout,
			},
			vtable: descriptor.vtable,
			staged: Staged {
				_library: Arc::new(library),
				file: Arc::new(path),
			},
		})
	}

	fn commit(&self, unit: &UnitId, definition: &DylibDefinition) {
		self.pinned.lock().push(definition.staged.clone());
		tracing::debug!(%unit, path = %definition.staged.file.display(), "dylib.pinned");
	}
}

/// A unit definition backed by an open dynamic library.
pub struct DylibDefinition {
	shape: Shape,
	vtable: *const core::ffi::c_void,
	staged: Staged,
}

// SAFETY: `vtable` points at immutable static data inside the staged
// library, which is kept open for at least as long as this definition.
unsafe impl Send for DylibDefinition {}
unsafe impl Sync for DylibDefinition {}

impl DylibDefinition {
	pub fn vtable_ptr(&self) -> *const core::ffi::c_void {
		self.vtable
	}

	/// Views the unit's function table as `T`.
	///
	/// # Safety
	/// `T` must be the `#[repr(C)]` table type the unit library exports, and
	/// the table pointer must be non-null.
	pub unsafe fn vtable<T>(&self) -> &T {
		unsafe { &*self.vtable.cast::<T>() }
	}
}

impl Definition for DylibDefinition {
	fn shape(&self) -> &Shape {
		&self.shape
	}
}

impl std::fmt::Debug for DylibDefinition {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DylibDefinition").field("shape", &self.shape).finish_non_exhaustive()
	}
}
