//! The trusted gateway into the running process's unit definitions.
//!
//! A [`Runtime`] owns every loaded unit and is the only thing allowed to swap
//! a unit's definition. It is exposed to the rest of the process as a
//! [`Capability`], a cheap handle over the [`Redefine`] trait that bootstrap
//! code creates once and hands to whoever reloads units.
//!
//! Units are handed out as [`UnitRef`]s. A redefinition replaces what a
//! `UnitRef` points at without replacing the `UnitRef` itself, so holders see
//! the new behavior on their next call and never a mix of old and new.

pub mod abi;
mod dylib;
mod error;
mod handle;
mod redefine;
mod runtime;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use dylib::{DylibDefinition, DylibLoader};
pub use error::{AlreadyInstalled, BootstrapError, CapabilityError, Incompatibility, LoadError};
pub use handle::{Capability, install, installed};
pub use redefine::{Redefine, Redefined};
pub use runtime::{Definition, Installed, Loader, Runtime, Shape, UnitRef};
