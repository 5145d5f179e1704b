//! Core data model for in-process unit reloading: identities, on-disk layout and artifacts.

/// Compiled artifact bytes.
pub mod artifact;
/// Deterministic mapping between unit identities and file paths.
pub mod layout;
/// Logical unit identities.
pub mod unit;

pub use artifact::Artifact;
pub use layout::SourceLayout;
pub use unit::{InvalidUnitId, UnitId};
