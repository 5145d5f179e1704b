//! C ABI a unit library exports so the [`DylibLoader`](crate::DylibLoader) can describe it.
//!
//! A unit library exports one `extern "C"` function named `relive_unit_v1`
//! returning a [`UnitDescriptorV1`]. The descriptor and everything it points
//! at must be `'static` data inside the library.

use core::ffi::{c_char, c_void};

/// ABI version carried by [`UnitDescriptorV1::abi_version`].
pub const RELIVE_UNIT_ABI_V1: u32 = 1;

/// Null-terminated name of the entry symbol.
pub const UNIT_ENTRY_V1: &[u8] = b"relive_unit_v1\0";

/// Signature of the exported entry symbol.
pub type UnitEntryV1 = unsafe extern "C" fn() -> UnitDescriptorV1;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UnitDescriptorV1 {
	pub abi_version: u32,
	/// Null-terminated UTF-8 unit name, e.g. `demo.greeter`.
	pub name: *const c_char,
	/// Fingerprint of every type whose layout outlives a redefinition.
	/// Two definitions with different fingerprints cannot replace each other.
	pub layout: u64,
	/// Unit-defined function table.
	pub vtable: *const c_void,
}
