//! In-memory loader for exercising the runtime without building libraries.
//!
//! A text artifact is a set of `key=value` lines:
//!
//! ```text
//! unit=a.b.Foo
//! abi=1
//! layout=7
//! body=hello
//! ```
//!
//! `unit` defaults to the requested unit, `abi` and `layout` to 1, `body` to
//! the empty string. Anything that is not UTF-8 or has a malformed number is
//! rejected with a [`LoadError`].

use parking_lot::Mutex;
use relive_primitives::{Artifact, UnitId};

use crate::{Definition, LoadError, Loader, Shape};

/// Definition parsed from a text artifact; `body` stands in for behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDefinition {
	pub shape: Shape,
	pub body: String,
}

impl Definition for TextDefinition {
	fn shape(&self) -> &Shape {
		&self.shape
	}
}

/// Loader for text artifacts that records every unit it was asked to load
/// and every definition the runtime committed.
#[derive(Debug, Default)]
pub struct TextLoader {
	calls: Mutex<Vec<UnitId>>,
	commits: Mutex<Vec<(UnitId, String)>>,
}

impl TextLoader {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn calls(&self) -> Vec<UnitId> {
		self.calls.lock().clone()
	}

	/// Committed `(unit, body)` pairs, in order.
	pub fn commits(&self) -> Vec<(UnitId, String)> {
		self.commits.lock().clone()
	}
}

impl Loader for TextLoader {
	type Definition = TextDefinition;

	fn load(&self, unit: &UnitId, artifact: &Artifact) -> Result<TextDefinition, LoadError> {
		self.calls.lock().push(unit.clone());
		let text = std::str::from_utf8(artifact.bytes()).map_err(|e| LoadError::with_source("artifact is not UTF-8", e))?;

		let mut definition = TextDefinition {
			shape: Shape {
				unit: unit.to_string(),
				abi_version: 1,
				layout: 1,
			},
			body: String::new(),
		};
		for line in text.lines().filter(|l| !l.trim().is_empty()) {
			let Some((key, value)) = line.split_once('=') else {
				return Err(LoadError::new(format!("malformed line {line:?}")));
			};
			match key.trim() {
				"unit" => definition.shape.unit = value.trim().to_string(),
				"abi" => {
					definition.shape.abi_version = value
						.trim()
						.parse()
						.map_err(|e| LoadError::with_source(format!("bad abi {value:?}"), e))?
				}
				"layout" => {
					definition.shape.layout = value
						.trim()
						.parse()
						.map_err(|e| LoadError::with_source(format!("bad layout {value:?}"), e))?
				}
				"body" => definition.body = value.to_string(),
				other => return Err(LoadError::new(format!("unknown key {other:?}"))),
			}
		}
		Ok(definition)
	}

	fn commit(&self, unit: &UnitId, definition: &TextDefinition) {
		self.commits.lock().push((unit.clone(), definition.body.clone()));
	}
}

/// Builds a text artifact with the given layout and body.
pub fn text_artifact(layout: u64, body: &str) -> Artifact {
	Artifact::new(format!("layout={layout}\nbody={body}\n").into_bytes(), "<memory>")
}
