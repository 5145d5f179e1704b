//! Demo unit `demo.greeter`, compiled standalone by `rustc --crate-type cdylib`.
//!
//! Edit `GREETING` and reload to see the change through live handles.
//! Changing `LAYOUT` models a change to instance layout and is refused.

use core::ffi::{c_char, c_void};

const GREETING: &core::ffi::CStr = c"hello from demo.greeter";
const LAYOUT: u64 = 0x6772_6565_7465_7201;

#[repr(C)]
pub struct UnitDescriptorV1 {
	pub abi_version: u32,
	pub name: *const c_char,
	pub layout: u64,
	pub vtable: *const c_void,
}

#[repr(C)]
pub struct GreeterV1 {
	pub greet: extern "C" fn() -> *const c_char,
}

extern "C" fn greet() -> *const c_char {
	GREETING.as_ptr()
}

static VTABLE: GreeterV1 = GreeterV1 { greet };

#[unsafe(no_mangle)]
pub extern "C" fn relive_unit_v1() -> UnitDescriptorV1 {
	UnitDescriptorV1 {
		abi_version: 1,
		name: c"demo.greeter".as_ptr(),
		layout: LAYOUT,
		vtable: &VTABLE as *const GreeterV1 as *const c_void,
	}
}
