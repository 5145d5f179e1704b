use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical dotted name of a reloadable unit (e.g. `a.b.Foo`).
///
/// Every segment is a plain identifier, so the name maps onto a relative
/// path without escaping and back again. Clones share one allocation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitId(Arc<str>);

/// Rejected unit name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidUnitId {
	#[error("unit name is empty")]
	Empty,
	#[error("unit name {name:?} has an empty segment")]
	EmptySegment { name: String },
	#[error("unit name {name:?} has invalid segment {segment:?}")]
	InvalidSegment { name: String, segment: String },
}

impl UnitId {
	/// Separator between name segments.
	pub const SEPARATOR: char = '.';

	pub fn new(name: impl Into<String>) -> Result<Self, InvalidUnitId> {
		let name = name.into();
		if name.is_empty() {
			return Err(InvalidUnitId::Empty);
		}
		for segment in name.split(Self::SEPARATOR) {
			if segment.is_empty() {
				return Err(InvalidUnitId::EmptySegment { name });
			}
			if !is_identifier(segment) {
				let segment = segment.to_string();
				return Err(InvalidUnitId::InvalidSegment { name, segment });
			}
		}
		Ok(Self(Arc::from(name)))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Name segments from outermost to innermost.
	pub fn segments(&self) -> impl Iterator<Item = &str> {
		self.0.split(Self::SEPARATOR)
	}

	/// Last segment, the unit's simple name.
	pub fn simple_name(&self) -> &str {
		self.0.rsplit(Self::SEPARATOR).next().unwrap_or(&self.0)
	}
}

fn is_identifier(segment: &str) -> bool {
	let mut chars = segment.chars();
	matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
		&& chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

impl fmt::Display for UnitId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl fmt::Debug for UnitId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "UnitId({})", self.0)
	}
}

impl FromStr for UnitId {
	type Err = InvalidUnitId;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

impl TryFrom<String> for UnitId {
	type Error = InvalidUnitId;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl From<UnitId> for String {
	fn from(value: UnitId) -> Self {
		value.0.to_string()
	}
}

impl AsRef<str> for UnitId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
